//! Errors and error-related utilities.

use std::{error, fmt, result};

/// The result type used throughout this library.
pub type Result<T> = result::Result<T, Box<dyn error::Error + Send + Sync>>;

/// No usable search term could be resolved from an input.
#[derive(Debug)]
pub struct InvalidInput(pub String);

/// The top-level structure of a batch input file is not recognized.
#[derive(Debug)]
pub struct UnsupportedFileShape(pub String);

/// Invalid command line argument or settings value.
#[derive(Debug)]
pub struct InvalidArgument(pub String);

/// The data provider failed: transport, HTTP status, or a malformed payload.
#[derive(Debug)]
pub struct ProviderError(pub String);

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid input: {}", self.0)
    }
}

impl fmt::Display for UnsupportedFileShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unsupported input file structure: {}", self.0)
    }
}

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid argument: {}", self.0)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "provider error: {}", self.0)
    }
}

impl error::Error for InvalidInput {}

impl error::Error for UnsupportedFileShape {}

impl error::Error for InvalidArgument {}

impl error::Error for ProviderError {}

/// A helper for constructing [InvalidInput].
pub fn invalid_input(s: String) -> Box<dyn error::Error + Send + Sync> {
    InvalidInput(s).into()
}

/// A helper for constructing [UnsupportedFileShape].
pub fn unsupported_shape(s: String) -> Box<dyn error::Error + Send + Sync> {
    UnsupportedFileShape(s).into()
}

/// A helper for constructing [ProviderError].
pub fn provider_error(s: String) -> Box<dyn error::Error + Send + Sync> {
    ProviderError(s).into()
}

/// A helper for constructing [ProviderError].
pub fn provider_error_ref(s: &str) -> Box<dyn error::Error + Send + Sync> {
    ProviderError(s.to_owned()).into()
}
