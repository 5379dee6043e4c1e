//! HDF5 chunk filters.
//!
//! A chunk of a dataset may be encoded by a sequence of filters, each of which specifies a reversible transform of bytes.
//! The filters applied to a chunk are described by a [`Pipeline`] stored in the dataset's object header.
//! This module only implements the decode direction: [`Pipeline::apply`] reverses the filters of a pipeline, last filter first.
//!
//! Filters are looked up by [`FilterId`] in a [`FilterRegistry`].
//! The process-wide registry returned by [`global_registry`] holds every built-in filter enabled by cargo features.
//!
//! See <https://docs.hdfgroup.org/hdf5/develop/_f_m_t3.html#FilterMessage>.

pub mod bit_cursor;
pub mod element;

#[cfg(feature = "deflate")]
pub mod deflate;
#[cfg(feature = "fletcher32")]
pub mod fletcher32;
#[cfg(feature = "nbit")]
pub mod nbit;
#[cfg(feature = "scaleoffset")]
pub mod scaleoffset;
#[cfg(feature = "shuffle")]
pub mod shuffle;
#[cfg(feature = "szip")]
pub mod szip;

mod filter_error;
mod filter_pipeline;
mod filter_registry;
mod options;

#[cfg(feature = "deflate")]
pub use deflate::DeflateCodec;
#[cfg(feature = "fletcher32")]
pub use fletcher32::Fletcher32Codec;
#[cfg(feature = "nbit")]
pub use nbit::NbitCodec;
#[cfg(feature = "scaleoffset")]
pub use scaleoffset::ScaleOffsetCodec;
#[cfg(feature = "shuffle")]
pub use shuffle::ShuffleCodec;
#[cfg(feature = "szip")]
pub use szip::SzipCodec;

pub use filter_error::{ErrorClass, ErrorReport, ErrorSubclass};
pub use filter_pipeline::{
    CallbackAction, FilterCallback, InvalidPipelineError, Pipeline, PipelineEntry, PipelineError,
    MAX_FILTERS,
};
pub use filter_registry::{
    global_registry, FilterDescriptor, FilterPlugin, FilterRegistry, RegistryError,
    FILTER_DESCRIPTOR_VERSION,
};
pub use options::{CodecOptions, CodecOptionsBuilder};

use std::borrow::Cow;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw bytes handed between filters.
///
/// A filter receives its input as [`RawBytes`] and returns a new [`RawBytes`].
/// A filter that only drops bytes may return a borrowed sub-slice of its input.
pub type RawBytes<'a> = Cow<'a, [u8]>;

/// Filter identifiers at or above this value are reserved for user-defined filters.
pub const FILTER_RESERVED: u16 = 256;

/// The maximum filter identifier supported by this crate.
pub const MAX_FILTER_ID: u16 = FILTER_RESERVED - 1;

/// A filter identifier.
///
/// Identifiers below [`FILTER_RESERVED`] are owned by the HDF5 library.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FilterId(u16);

impl FilterId {
    /// The `deflate` filter.
    pub const DEFLATE: Self = Self(1);
    /// The `shuffle` filter.
    pub const SHUFFLE: Self = Self(2);
    /// The `fletcher32` filter.
    pub const FLETCHER32: Self = Self(3);
    /// The `szip` filter.
    pub const SZIP: Self = Self(4);
    /// The `nbit` filter.
    pub const NBIT: Self = Self(5);
    /// The `scaleoffset` filter.
    pub const SCALEOFFSET: Self = Self(6);

    /// Create a new filter identifier.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Return the identifier as a [`u16`].
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns true if the identifier is owned by the library (i.e. not user-defined).
    #[must_use]
    pub const fn is_library_owned(self) -> bool {
        self.0 <= MAX_FILTER_ID
    }
}

/// Filter flags.
///
/// The flags stored with each [`PipelineEntry`] are combined with the flags of the pipeline invocation before being passed to a filter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterFlags(u16);

impl FilterFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The filter is optional: a failure to apply it when writing is not an error.
    pub const OPTIONAL: Self = Self(0x0001);
    /// The filter is applied in reverse (decoded).
    pub const REVERSE: Self = Self(0x0100);
    /// Skip error detection code verification.
    pub const SKIP_EDC: Self = Self(0x0200);

    /// Create flags from their raw representation.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Return the raw representation of the flags.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns true if all flags in `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for FilterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for FilterFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The direction of a pipeline invocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Apply filters (write). Not supported.
    Encode,
    /// Reverse filters (read).
    Decode,
}

/// Filter codec traits.
///
/// A filter codec is stateless: per-chunk parameters are passed to [`decode`](FilterCodecTraits::decode) as the client data values stored in the pipeline.
pub trait FilterCodecTraits: Send + Sync + core::fmt::Debug {
    /// The filter identifier.
    fn id(&self) -> FilterId;

    /// A human-readable name of the filter.
    fn name(&self) -> &'static str;

    /// Decode `encoded_value`.
    ///
    /// `flags` must contain [`FilterFlags::REVERSE`].
    /// `buf_size` is the allocation size of the buffer holding `encoded_value`, used by filters that cannot predict their output size.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the filter does not support the requested direction, `client_params` are invalid, or `encoded_value` is malformed.
    fn decode<'a>(
        &self,
        flags: FilterFlags,
        client_params: &[u32],
        encoded_value: RawBytes<'a>,
        buf_size: usize,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError>;
}

/// A codec error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The filter was invoked in the encode direction.
    #[error("the {_0} filter only supports decoding")]
    EncodeUnsupported(&'static str),
    /// The decoded output could not be allocated.
    #[error("failed to allocate {_0} bytes")]
    Allocation(usize),
    /// An embedded checksum does not match the decoded value.
    #[error("the stored checksum {stored:#010x} does not match the computed checksum {computed:#010x}")]
    InvalidChecksum {
        /// The stored checksum.
        stored: u32,
        /// The computed checksum.
        computed: u32,
    },
    /// The inflate stream is malformed.
    #[error("inflate failed: {_0}")]
    Inflate(String),
    /// The filter client data values are invalid.
    #[error("invalid {filter} filter parameters: {reason}")]
    InvalidParameters {
        /// The filter name.
        filter: &'static str,
        /// The reason the parameters are invalid.
        reason: String,
    },
    /// The encoded bytes are malformed.
    #[error("{message}")]
    InvalidData {
        /// A description of the problem.
        message: String,
        /// The byte offset in the encoded input, if known.
        offset: Option<u64>,
    },
    /// An unsupported feature was requested.
    #[error("unsupported: {_0}")]
    Unsupported(String),
    /// An external decompression library failed.
    #[error("{library} failed: {message}")]
    External {
        /// The library name.
        library: &'static str,
        /// The library error message.
        message: String,
    },
    /// Other
    #[error("{_0}")]
    Other(String),
}

impl From<&str> for CodecError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for CodecError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}

impl CodecError {
    /// Create a [`CodecError::InvalidParameters`] error.
    pub fn invalid_parameters(filter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            filter,
            reason: reason.into(),
        }
    }

    /// Returns true if the error ends a pipeline invocation regardless of the failure callback.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EncodeUnsupported(_) | Self::Unsupported(_))
    }
}

/// Return an error unless `flags` request the decode direction.
pub(crate) fn ensure_decode(flags: FilterFlags, filter: &'static str) -> Result<(), CodecError> {
    if flags.contains(FilterFlags::REVERSE) {
        Ok(())
    } else {
        Err(CodecError::EncodeUnsupported(filter))
    }
}

/// Allocate a zero-initialised output buffer of `len` bytes.
#[allow(dead_code)]
pub(crate) fn allocate_zeroed(len: usize) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| CodecError::Allocation(len))?;
    bytes.resize(len, 0);
    Ok(bytes)
}
