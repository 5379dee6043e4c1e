//! Codec options for decoding.

use crate::config::global_config;

/// Codec options for decoding.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    validate_checksums: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            validate_checksums: global_config().validate_checksums(),
        }
    }
}

impl CodecOptions {
    /// Create a new codec options builder.
    #[must_use]
    pub fn builder() -> CodecOptionsBuilder {
        CodecOptionsBuilder::new()
    }

    /// Return the validate checksums setting.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the validate checksums setting.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) {
        self.validate_checksums = validate_checksums;
    }
}

/// Builder for [`CodecOptions`].
#[derive(Debug, Clone)]
pub struct CodecOptionsBuilder {
    validate_checksums: bool,
}

impl Default for CodecOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecOptionsBuilder {
    /// Create a new codec options builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validate_checksums: global_config().validate_checksums(),
        }
    }

    /// Build into codec options.
    #[must_use]
    pub fn build(&self) -> CodecOptions {
        CodecOptions {
            validate_checksums: self.validate_checksums,
        }
    }

    /// Set whether error detection filters validate checksums.
    #[must_use]
    pub fn validate_checksums(mut self, validate_checksums: bool) -> Self {
        self.validate_checksums = validate_checksums;
        self
    }
}
