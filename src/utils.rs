//! Helper functions that don't particularly belong to any concrete module of the allocator.

use std::mem;

/// It aligns `to_be_aligned` using `aligment`, which must be a power of two.
///
/// Mappings are always handed out in whole pages, so this is used to tell how much
/// address space a request of a given size really takes.
pub fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + aligment - 1) & !(aligment - 1)
}

/// Tells whether `alignment` is something a caller is allowed to ask for: a power
/// of two and a multiple of the computer's pointer size.
pub fn is_valid_alignment(alignment: usize) -> bool {
    alignment.is_power_of_two() && alignment % mem::size_of::<usize>() == 0
}
