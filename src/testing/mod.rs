//! Offline test support: synthetic frames and a hardware-free backend.
//!
//! Kept in the library (not `#[cfg(test)]`) so integration tests and
//! downstream consumers can exercise the full pipeline without a
//! camera attached.

mod synthetic;

pub use synthetic::{synthetic_frame, SyntheticBackend};
