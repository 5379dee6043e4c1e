use serde::Serialize;

use super::{CodecError, PipelineError, RegistryError};

/// The primary class of a reported error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The bytes on disk do not conform to the file format.
    Format,
    /// The checker itself could not proceed.
    Internal,
}

/// The secondary class of a reported error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSubclass {
    /// Filter registration.
    Registry,
    /// Filter pipeline execution.
    Pipeline,
    /// Checksum verification.
    Checksum,
    /// Decompression of a compressed stream.
    Decompression,
    /// Filter client data values.
    Parameters,
    /// Malformed filtered data.
    Data,
    /// Memory allocation.
    Resource,
    /// An unsupported feature.
    Unsupported,
}

/// A structured error entry, as consumed by the error stack of a format checker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// The primary class.
    pub primary: ErrorClass,
    /// The secondary class.
    pub secondary: ErrorSubclass,
    /// A description of the error.
    pub message: String,
    /// The byte offset of the error, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// A decoded value associated with the error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
}

impl ErrorReport {
    /// Create a new error report.
    #[must_use]
    pub fn new(primary: ErrorClass, secondary: ErrorSubclass, message: impl Into<String>) -> Self {
        Self {
            primary,
            secondary,
            message: message.into(),
            offset: None,
            value: None,
        }
    }

    /// Set the byte offset.
    #[must_use]
    pub fn with_offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    /// Set the decoded value.
    #[must_use]
    pub fn with_value(mut self, value: Option<u64>) -> Self {
        self.value = value;
        self
    }
}

impl core::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}/{:?}: {}", self.primary, self.secondary, self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " (at byte offset {offset})")?;
        }
        if let Some(value) = self.value {
            write!(f, " (value {value})")?;
        }
        Ok(())
    }
}

impl CodecError {
    /// Create an [`ErrorReport`] for the error channel.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        let message = self.to_string();
        match self {
            Self::EncodeUnsupported(_) => {
                ErrorReport::new(ErrorClass::Internal, ErrorSubclass::Pipeline, message)
            }
            Self::Allocation(size) => {
                ErrorReport::new(ErrorClass::Internal, ErrorSubclass::Resource, message)
                    .with_value(Some(*size as u64))
            }
            Self::InvalidChecksum { stored, .. } => {
                ErrorReport::new(ErrorClass::Format, ErrorSubclass::Checksum, message)
                    .with_value(Some(u64::from(*stored)))
            }
            Self::Inflate(_) | Self::External { .. } => {
                ErrorReport::new(ErrorClass::Format, ErrorSubclass::Decompression, message)
            }
            Self::InvalidParameters { .. } => {
                ErrorReport::new(ErrorClass::Format, ErrorSubclass::Parameters, message)
            }
            Self::InvalidData { offset, .. } => {
                ErrorReport::new(ErrorClass::Format, ErrorSubclass::Data, message)
                    .with_offset(*offset)
            }
            Self::Unsupported(_) => {
                ErrorReport::new(ErrorClass::Internal, ErrorSubclass::Unsupported, message)
            }
            Self::Other(_) => ErrorReport::new(ErrorClass::Internal, ErrorSubclass::Data, message),
        }
    }
}

impl PipelineError {
    /// Create an [`ErrorReport`] for the error channel.
    ///
    /// A filter failure is reported with the class of the underlying [`CodecError`].
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        match self {
            Self::IllegalOperation => {
                ErrorReport::new(ErrorClass::Internal, ErrorSubclass::Pipeline, self.to_string())
            }
            Self::UnregisteredFilter { id, .. } => {
                ErrorReport::new(ErrorClass::Format, ErrorSubclass::Pipeline, self.to_string())
                    .with_value(Some(u64::from(id.get())))
            }
            Self::FilterFailed { source, .. } => {
                let mut report = source.report();
                report.message = self.to_string();
                report
            }
        }
    }
}

impl RegistryError {
    /// Create an [`ErrorReport`] for the error channel.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        let Self::InvalidFilterId(id) = self;
        ErrorReport::new(ErrorClass::Internal, ErrorSubclass::Registry, self.to_string())
            .with_value(Some(u64::from(id.get())))
    }
}
