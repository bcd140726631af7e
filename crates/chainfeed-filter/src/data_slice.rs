//! Account data projections.

use bytes::{Bytes, BytesMut};

use crate::error::FilterError;
use crate::limits::FilterLimits;
use crate::request::DataSliceSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSlice {
    pub offset: usize,
    pub length: usize,
}

impl DataSlice {
    /// Validate a slice list: bounded count, sorted, non-overlapping.
    pub fn compile(specs: &[DataSliceSpec], limits: &FilterLimits) -> Result<Vec<Self>, FilterError> {
        if specs.len() > limits.max_data_slices {
            return Err(FilterError::TooManyDataSlices {
                max: limits.max_data_slices,
            });
        }
        let mut slices = Vec::with_capacity(specs.len());
        let mut prev_end = 0usize;
        for (index, spec) in specs.iter().enumerate() {
            let offset = usize::try_from(spec.offset).unwrap_or(usize::MAX);
            let length = usize::try_from(spec.length).unwrap_or(usize::MAX);
            if index > 0 && offset < prev_end {
                return Err(FilterError::DataSliceOverlap { index });
            }
            prev_end = offset.saturating_add(length);
            slices.push(Self { offset, length });
        }
        Ok(slices)
    }
}

/// Apply `slices` to `data`. Slices past the end are clipped; an empty slice
/// list returns the data unchanged.
pub fn apply_slices(slices: &[DataSlice], data: &Bytes) -> Bytes {
    match slices {
        [] => data.clone(),
        [only] => data.slice(clip(only, data.len())),
        many => {
            let mut out = BytesMut::new();
            for slice in many {
                out.extend_from_slice(&data[clip(slice, data.len())]);
            }
            out.freeze()
        }
    }
}

fn clip(slice: &DataSlice, len: usize) -> std::ops::Range<usize> {
    let start = slice.offset.min(len);
    let end = slice.offset.saturating_add(slice.length).min(len);
    start..end
}
