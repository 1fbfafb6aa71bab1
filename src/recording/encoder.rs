//! H.264 encoder wrapper using openh264.

use crate::errors::CameraError;
use crate::types::FrameResult;
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

/// Encodes RGB24 frames into Annex B H.264 NAL units.
pub struct FrameEncoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl FrameEncoder {
    /// Dimensions are fixed for the lifetime of the encoder; openh264
    /// infers them from the YUV source at encode time.
    pub fn new(width: u32, height: u32) -> Result<Self, CameraError> {
        let encoder = Encoder::new()
            .map_err(|e| CameraError::EncodingError(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            frame_count: 0,
        })
    }

    /// Encode one captured frame.
    pub fn encode_frame(&mut self, frame: &FrameResult) -> Result<EncodedFrame, CameraError> {
        self.encode_rgb(&frame.data)
    }

    /// Encode raw RGB24 pixel data.
    pub fn encode_rgb(&mut self, rgb_data: &[u8]) -> Result<EncodedFrame, CameraError> {
        let expected_size = (self.width * self.height * 3) as usize;
        if rgb_data.len() != expected_size {
            return Err(CameraError::EncodingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected_size,
                rgb_data.len()
            )));
        }

        let yuv = rgb_to_yuv420(rgb_data, self.width, self.height);
        let yuv_buffer =
            YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| CameraError::EncodingError(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Force the next frame to be encoded as a keyframe.
    pub fn force_keyframe(&mut self) {
        self.encoder.force_intra_frame();
    }
}

/// Result of encoding a single frame.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// H.264 data in Annex B format (with start codes).
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// Convert RGB24 to YUV420 planar (BT.601).
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let rgb_idx = (y * w + x) * 3;
            let r = rgb[rgb_idx] as i32;
            let g = rgb[rgb_idx + 1] as i32;
            let b = rgb[rgb_idx + 2] as i32;

            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            // Subsample U and V over 2x2 blocks.
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuv420_output_size() {
        let width = 640u32;
        let height = 480u32;
        let rgb = vec![128u8; (width * height * 3) as usize];

        let yuv = rgb_to_yuv420(&rgb, width, height);
        assert_eq!(yuv.len(), (width * height * 3 / 2) as usize);
    }

    #[test]
    fn encoder_rejects_wrong_frame_size() {
        let mut encoder = FrameEncoder::new(640, 480).expect("encoder creation failed");
        let rgb = vec![0u8; 100];
        assert!(encoder.encode_rgb(&rgb).is_err());
    }

    #[test]
    fn first_frame_is_keyframe() {
        let mut encoder = FrameEncoder::new(320, 240).expect("encoder creation failed");
        let rgb = vec![128u8; 320 * 240 * 3];

        let encoded = encoder.encode_rgb(&rgb).expect("encoding failed");
        assert!(!encoded.data.is_empty());
        assert!(
            encoded.data.starts_with(&[0x00, 0x00, 0x00, 0x01])
                || encoded.data.starts_with(&[0x00, 0x00, 0x01]),
            "should start with an Annex B start code"
        );
        assert!(encoded.is_keyframe);
        assert_eq!(encoder.frame_count(), 1);
    }
}
