//! Pure validation and partitioning math
//!
//! These are I/O-free helper functions used at the query-construction
//! boundary: partition slicing for point/range sets and range well-
//! formedness checks.

use core::ops::Range;

use crate::error::{Result, SndaError};
use crate::value::DimensionValue;

/// Compute the slice of an ordered input assigned to one partition.
///
/// Partitions tile the input by ceiling-division blocks: slices for
/// indices `0..partition_count` are disjoint, contiguous, and cover the
/// input exactly once. Inputs shorter than `partition_count` leave the
/// high-indexed partitions empty.
pub fn partition_slice(
    len: usize,
    partition_index: usize,
    partition_count: usize,
) -> Result<Range<usize>> {
    if partition_count == 0 {
        return Err(SndaError::Schema("partition_count must be positive".into()));
    }
    if partition_index >= partition_count {
        return Err(SndaError::Schema(format!(
            "partition_index {partition_index} must be less than partition_count {partition_count}"
        )));
    }
    let chunk = len.div_ceil(partition_count);
    let start = (partition_index * chunk).min(len);
    let end = (start + chunk).min(len);
    Ok(start..end)
}

/// Check that a range pair is same-typed and not inverted
pub fn validate_range(lower: &DimensionValue, upper: &DimensionValue) -> Result<()> {
    match lower.cmp_same_type(upper) {
        None => Err(SndaError::TypeMismatch {
            declared: lower.data_type(),
            requested: upper.data_type(),
        }),
        Some(core::cmp::Ordering::Greater) => Err(SndaError::Schema(format!(
            "range lower bound {lower} exceeds upper bound {upper}"
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_tiling_is_exact() {
        // Union over all indices reconstructs 0..len with no gaps or overlap
        for len in 0..40usize {
            for count in 1..10usize {
                let mut covered = Vec::new();
                for index in 0..count {
                    let slice = partition_slice(len, index, count).unwrap();
                    covered.extend(slice);
                }
                let expected: Vec<usize> = (0..len).collect();
                assert_eq!(covered, expected, "len={len} count={count}");
            }
        }
    }

    #[test]
    fn test_short_input_leaves_high_partitions_empty() {
        assert_eq!(partition_slice(1, 0, 2).unwrap(), 0..1);
        assert_eq!(partition_slice(1, 1, 2).unwrap(), 1..1);
        assert_eq!(partition_slice(0, 3, 4).unwrap(), 0..0);
    }

    #[test]
    fn test_invalid_partition_args() {
        assert!(partition_slice(10, 0, 0).is_err());
        assert!(partition_slice(10, 2, 2).is_err());
    }

    #[test]
    fn test_single_partition_is_identity() {
        assert_eq!(partition_slice(7, 0, 1).unwrap(), 0..7);
    }

    #[test]
    fn test_validate_range() {
        let lo = DimensionValue::Int64(1);
        let hi = DimensionValue::Int64(5);
        assert!(validate_range(&lo, &hi).is_ok());
        assert!(validate_range(&hi, &lo).is_err());
        assert!(validate_range(&lo, &DimensionValue::UInt64(5)).is_err());
    }
}
