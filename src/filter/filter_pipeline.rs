use std::borrow::Cow;

use derive_more::Deref;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    global_registry, CodecError, CodecOptions, Direction, FilterFlags, FilterId, FilterRegistry,
};

/// The maximum number of filters in a pipeline.
pub const MAX_FILTERS: usize = 32;

/// A filter applied to a chunk, as stored in the pipeline of a dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEntry {
    filter_id: FilterId,
    #[serde(default)]
    flags: FilterFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    client_params: Vec<u32>,
}

impl PipelineEntry {
    /// Create a new pipeline entry.
    #[must_use]
    pub fn new(filter_id: FilterId, flags: FilterFlags, client_params: Vec<u32>) -> Self {
        Self {
            filter_id,
            flags,
            name: None,
            client_params,
        }
    }

    /// Set the optional filter name stored with the entry.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The filter identifier.
    #[must_use]
    pub const fn filter_id(&self) -> FilterId {
        self.filter_id
    }

    /// The flags stored with the entry.
    #[must_use]
    pub const fn flags(&self) -> FilterFlags {
        self.flags
    }

    /// The filter name stored with the entry, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The client data values of the filter.
    #[must_use]
    pub fn client_params(&self) -> &[u32] {
        &self.client_params
    }
}

/// An invalid pipeline error.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("a pipeline has at most {max} filters, got {_0}", max = MAX_FILTERS)]
pub struct InvalidPipelineError(usize);

/// The filter pipeline of a dataset.
///
/// Filters are listed in the order they were applied when the chunk was written.
/// A pipeline holds at most [`MAX_FILTERS`] entries, so each entry has a bit in a [`u32`] filter mask.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deref, Serialize, Deserialize)]
#[serde(try_from = "Vec<PipelineEntry>", into = "Vec<PipelineEntry>")]
pub struct Pipeline {
    entries: Vec<PipelineEntry>,
}

impl TryFrom<Vec<PipelineEntry>> for Pipeline {
    type Error = InvalidPipelineError;

    fn try_from(entries: Vec<PipelineEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<Pipeline> for Vec<PipelineEntry> {
    fn from(pipeline: Pipeline) -> Self {
        pipeline.entries
    }
}

/// A pipeline error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline was applied in the encode direction.
    #[error("filter pipelines can only be applied in the decode direction")]
    IllegalOperation,
    /// A filter in the pipeline is not registered.
    #[error("filter {id} at pipeline index {index} is not registered")]
    UnregisteredFilter {
        /// The index of the entry in the pipeline.
        index: usize,
        /// The filter identifier.
        id: FilterId,
    },
    /// A filter failed to decode the chunk.
    #[error("filter {id} at pipeline index {index} failed: {source}")]
    FilterFailed {
        /// The index of the entry in the pipeline.
        index: usize,
        /// The filter identifier.
        id: FilterId,
        /// The codec error.
        #[source]
        source: CodecError,
    },
}

/// The action taken when a filter fails.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// Fail the pipeline invocation.
    Fail,
    /// Skip the filter and continue with the undecoded buffer.
    Continue,
}

/// A filter failure callback.
///
/// Implemented for closures `Fn(FilterId, &[u8]) -> CallbackAction`.
pub trait FilterCallback: Send + Sync {
    /// Decide how to proceed after the filter `filter_id` failed to decode `buffer`.
    fn on_failure(&self, filter_id: FilterId, buffer: &[u8]) -> CallbackAction;
}

impl<F> FilterCallback for F
where
    F: Fn(FilterId, &[u8]) -> CallbackAction + Send + Sync,
{
    fn on_failure(&self, filter_id: FilterId, buffer: &[u8]) -> CallbackAction {
        self(filter_id, buffer)
    }
}

/// The output of a successful filter.
enum Decoded {
    /// A prefix of the input.
    Prefix(usize),
    /// A new buffer.
    Replaced(Vec<u8>),
}

/// The bit of the pipeline entry at `index` in a filter mask.
const fn filter_bit(index: usize) -> u32 {
    // index < MAX_FILTERS
    1 << index
}

impl Pipeline {
    /// Create a new pipeline.
    ///
    /// # Errors
    /// Returns [`InvalidPipelineError`] if there are more than [`MAX_FILTERS`] entries.
    pub fn new(entries: Vec<PipelineEntry>) -> Result<Self, InvalidPipelineError> {
        if entries.len() > MAX_FILTERS {
            Err(InvalidPipelineError(entries.len()))
        } else {
            Ok(Self { entries })
        }
    }

    /// The entries of the pipeline.
    #[must_use]
    pub fn entries(&self) -> &[PipelineEntry] {
        &self.entries
    }

    /// Apply the pipeline to `buffer` with the filters of the [global registry](global_registry).
    ///
    /// See [`apply_with_registry`](Pipeline::apply_with_registry).
    ///
    /// # Errors
    /// Returns a [`PipelineError`] if the pipeline cannot be applied.
    pub fn apply(
        &self,
        direction: Direction,
        filter_mask: u32,
        callback: Option<&dyn FilterCallback>,
        buffer: &mut Vec<u8>,
        options: &CodecOptions,
    ) -> Result<u32, PipelineError> {
        self.apply_with_registry(
            global_registry(),
            direction,
            filter_mask,
            callback,
            buffer,
            options,
        )
    }

    /// Decode `buffer` by reversing the filters of the pipeline, last filter first.
    ///
    /// Entries whose bit is set in `filter_mask` were not applied to the chunk and are skipped.
    /// Every other entry must be registered in `registry`, which is checked before any filter runs.
    ///
    /// If a filter fails, `callback` decides whether to fail or to continue with the buffer as it was before the filter.
    /// Without a callback, a filter failure fails the pipeline.
    /// Failures of unsupported operations are not passed to the callback.
    ///
    /// On success, `buffer` holds the decoded chunk and the returned filter mask is `filter_mask` with the bits of the skipped failing filters set.
    /// On error, `buffer` is unchanged.
    ///
    /// # Errors
    /// Returns
    ///  - [`PipelineError::IllegalOperation`] if `direction` is [`Direction::Encode`],
    ///  - [`PipelineError::UnregisteredFilter`] if a filter is not registered, or
    ///  - [`PipelineError::FilterFailed`] if a filter fails and the failure is not skipped.
    pub fn apply_with_registry(
        &self,
        registry: &FilterRegistry,
        direction: Direction,
        filter_mask: u32,
        callback: Option<&dyn FilterCallback>,
        buffer: &mut Vec<u8>,
        options: &CodecOptions,
    ) -> Result<u32, PipelineError> {
        if direction != Direction::Decode {
            return Err(PipelineError::IllegalOperation);
        }

        let stages = self
            .entries
            .iter()
            .enumerate()
            .filter(|(index, _)| filter_mask & filter_bit(*index) == 0)
            .map(|(index, entry)| {
                registry
                    .lookup(entry.filter_id)
                    .map(|descriptor| (index, entry, descriptor))
                    .ok_or(PipelineError::UnregisteredFilter {
                        index,
                        id: entry.filter_id,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut base_flags = FilterFlags::REVERSE;
        if !options.validate_checksums() {
            base_flags |= FilterFlags::SKIP_EDC;
        }

        let mut current: Cow<'_, [u8]> = Cow::Borrowed(buffer.as_slice());
        let mut buf_size = buffer.capacity();
        let mut failed = 0;
        for (index, entry, descriptor) in stages.into_iter().rev() {
            log::debug!(
                "decoding {} bytes with filter {} ({}) at pipeline index {index}",
                current.len(),
                entry.filter_id,
                descriptor.name()
            );
            let decoded = match descriptor.decode(
                base_flags | entry.flags,
                &entry.client_params,
                Cow::Borrowed(&*current),
                buf_size,
                options,
            ) {
                Ok(Cow::Borrowed(decoded)) if decoded.as_ptr() == current.as_ptr() => {
                    Ok(Decoded::Prefix(decoded.len()))
                }
                Ok(decoded) => Ok(Decoded::Replaced(decoded.into_owned())),
                Err(err) => Err(err),
            };

            match decoded {
                Ok(Decoded::Prefix(len)) => {
                    current = match current {
                        Cow::Borrowed(bytes) => Cow::Borrowed(bytes.get(..len).unwrap_or(bytes)),
                        Cow::Owned(mut bytes) => {
                            bytes.truncate(len);
                            Cow::Owned(bytes)
                        }
                    };
                }
                Ok(Decoded::Replaced(decoded)) => {
                    buf_size = decoded.capacity();
                    current = Cow::Owned(decoded);
                }
                Err(err) => {
                    let action = if err.is_fatal() {
                        CallbackAction::Fail
                    } else {
                        callback.map_or(CallbackAction::Fail, |callback| {
                            callback.on_failure(entry.filter_id, &current)
                        })
                    };
                    match action {
                        CallbackAction::Continue => {
                            log::warn!(
                                "skipping filter {} at pipeline index {index}: {err}",
                                entry.filter_id
                            );
                            failed |= filter_bit(index);
                        }
                        CallbackAction::Fail => {
                            return Err(PipelineError::FilterFailed {
                                index,
                                id: entry.filter_id,
                                source: err,
                            });
                        }
                    }
                }
            }
        }

        match current {
            Cow::Owned(decoded) => *buffer = decoded,
            Cow::Borrowed(decoded) => {
                let len = decoded.len();
                buffer.truncate(len);
            }
        }
        Ok(filter_mask | failed)
    }

    /// Apply the pipeline to independent chunks in parallel with the filters of the [global registry](global_registry).
    ///
    /// `filter_masks[i]` is the filter mask of `chunks[i]` (`0` if absent).
    /// Returns the result of [`apply`](Pipeline::apply) for each chunk.
    #[must_use]
    pub fn apply_chunks_par(
        &self,
        chunks: &mut [Vec<u8>],
        filter_masks: &[u32],
        callback: Option<&dyn FilterCallback>,
        options: &CodecOptions,
    ) -> Vec<Result<u32, PipelineError>> {
        let registry = global_registry();
        chunks
            .par_iter_mut()
            .enumerate()
            .map(|(index, chunk)| {
                let filter_mask = filter_masks.get(index).copied().unwrap_or(0);
                self.apply_with_registry(
                    registry,
                    Direction::Decode,
                    filter_mask,
                    callback,
                    chunk,
                    options,
                )
            })
            .collect()
    }
}
