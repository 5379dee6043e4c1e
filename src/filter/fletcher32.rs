//! The `fletcher32` filter.
//!
//! Verifies and strips the Fletcher32 checksum appended to a chunk.
//!
//! The checksum is stored in the last four bytes of the chunk in little endian order.
//! Checksums stored in big endian order by older writers are also accepted.
//! Verification is skipped if [`FilterFlags::SKIP_EDC`](crate::filter::FilterFlags::SKIP_EDC) is set.
//!
//! This filter requires the `fletcher32` feature, which is enabled by default.
//!
//! ### Client data values
//! None.

mod fletcher32_codec;

use std::sync::Arc;

pub use fletcher32_codec::{checksum_fletcher32, Fletcher32Codec};

use super::{FilterDescriptor, FilterId, FilterPlugin};

const NAME: &str = "fletcher32";

// Register the filter.
inventory::submit! {
    FilterPlugin::new(FilterId::FLETCHER32, create_filter_fletcher32)
}

pub(crate) fn create_filter_fletcher32() -> FilterDescriptor {
    FilterDescriptor::new(Arc::new(Fletcher32Codec::new()))
}

const CHECKSUM_SIZE: usize = core::mem::size_of::<u32>();
