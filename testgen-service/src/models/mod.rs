//! Domain models for the test case generator.

pub mod generation;

pub use generation::{CodeInput, ShapedResponse, UploadedFile};
