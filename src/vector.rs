//! Host-side vector preparation: padding to a work-group multiple and the
//! default inputs used by the vector programs.

use crate::error::{LabError, LabResult};

/// Pad `data` with `neutral` until its length is a multiple of `local_size`.
///
/// Returns the length before padding so callers can ignore the tail when
/// reading results back.
pub fn pad_to_multiple<T: Copy>(data: &mut Vec<T>, local_size: usize, neutral: T) -> usize {
    let original = data.len();
    if local_size == 0 {
        return original;
    }
    let remainder = original % local_size;
    if remainder != 0 {
        data.resize(original + local_size - remainder, neutral);
    }
    original
}

/// Pad `data` with `neutral` up to the next power of two.
pub fn pad_to_power_of_two<T: Copy>(data: &mut Vec<T>, neutral: T) -> usize {
    let original = data.len();
    data.resize(original.max(1).next_power_of_two(), neutral);
    original
}

/// Number of work-groups needed to cover `len` items.
pub fn group_count(len: usize, local_size: usize) -> usize {
    len.div_ceil(local_size.max(1))
}

/// Number of Hillis-Steele passes for `len` items: `ceil(log2 len)`.
pub fn hillis_steele_passes(len: usize) -> u32 {
    if len <= 1 {
        0
    } else {
        usize::BITS - (len - 1).leading_zeros()
    }
}

/// Strides used by successive Hillis-Steele passes: 1, 2, 4, ... < `len`.
pub fn hillis_steele_strides(len: usize) -> Vec<u32> {
    (0..hillis_steele_passes(len)).map(|p| 1u32 << p).collect()
}

/// Largest power of two not above `max_work_group_size`, capped at 256.
pub fn default_local_size(max_work_group_size: usize) -> usize {
    let capped = max_work_group_size.clamp(1, 256);
    1 << (usize::BITS - 1 - capped.leading_zeros())
}

/// Default operands for the vector arithmetic program.
///
/// `A[i] = i` and `B[i] = i % 3`, so a length of 10 gives
/// `A = 0..9` and `B = 0, 1, 2, 0, 1, 2, 0, 1, 2, 0`.
pub fn arithmetic_operands(len: usize) -> (Vec<i32>, Vec<i32>) {
    let a = (0..len).map(|i| i as i32).collect();
    let b = (0..len).map(|i| (i % 3) as i32).collect();
    (a, b)
}

/// Parse a comma-separated list of integers such as `6,6,9,8`.
pub fn parse_csv(text: &str) -> LabResult<Vec<i32>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .map_err(|_| LabError::invalid(format!("'{s}' is not an integer")))
        })
        .collect()
}

/// Format a vector as `[a, b, c]`, truncating long vectors.
pub fn format_vector<T: std::fmt::Display>(data: &[T], limit: usize) -> String {
    let shown: Vec<String> = data.iter().take(limit).map(|v| v.to_string()).collect();
    if data.len() > limit {
        format!("[{}, ... ({} more)]", shown.join(", "), data.len() - limit)
    } else {
        format!("[{}]", shown.join(", "))
    }
}
