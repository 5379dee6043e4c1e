//! `h5pline` decodes the filter pipelines applied to chunked HDF5 dataset storage.
//!
//! A chunk stored in an HDF5 file may have been passed through a sequence of reversible filters when it was written (compression, byte shuffling, checksumming, bit packing).
//! A format checker must reverse that sequence before the structure and datatype of the chunk can be validated.
//! This crate provides that decode engine:
//! - a [filter registry](filter::FilterRegistry) mapping filter identifiers to codecs,
//! - a [pipeline executor](filter::Pipeline::apply) that undoes the filters of a chunk in reverse order, with a per-filter [failure policy](filter::FilterCallback), and
//! - the built-in HDF5 filters: `deflate`, `shuffle`, `fletcher32`, `szip`, `nbit` and `scaleoffset`.
//!
//! Only the decode direction is supported.
//!
//! ## Example
//! ```rust
//! # #[cfg(feature = "shuffle")]
//! # {
//! use h5pline::filter::{CodecOptions, Direction, FilterFlags, FilterId, Pipeline, PipelineEntry};
//!
//! // A chunk of two u16 elements (1, 2) shuffled with an element size of 2
//! let mut chunk: Vec<u8> = vec![1, 2, 0, 0];
//! # #[cfg(target_endian = "big")]
//! # let mut chunk: Vec<u8> = vec![0, 0, 1, 2];
//! let pipeline = Pipeline::new(vec![PipelineEntry::new(
//!     FilterId::SHUFFLE,
//!     FilterFlags::NONE,
//!     vec![2],
//! )])?;
//! let filter_mask = pipeline.apply(
//!     Direction::Decode,
//!     0,
//!     None,
//!     &mut chunk,
//!     &CodecOptions::default(),
//! )?;
//! assert_eq!(filter_mask, 0);
//! assert_eq!(chunk, [1u16.to_ne_bytes(), 2u16.to_ne_bytes()].concat());
//! # }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `deflate`: Enable the deflate filter.
//!  - `fletcher32`: Enable the fletcher32 checksum filter.
//!  - `nbit`: Enable the nbit filter.
//!  - `scaleoffset`: Enable the scaleoffset filter.
//!  - `shuffle`: Enable the shuffle filter.
//!
//! #### Non-Default
//!  - `szip`: Enable the szip filter (decoded with the pure Rust `rust-aec` CCSDS decoder).
//!
//! ## Licence
//! `h5pline` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod config;
pub mod filter;
pub mod plugin;
