//! Error types

mod sdk_error;

pub use sdk_error::{SdkError, SdkResult};
