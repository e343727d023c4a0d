//! Work partitioning helpers.

use std::ops::Range;

/// Row bands owned by slice `index` of `count`.
///
/// The frame is cut into bands of `tile_height` rows which are dealt
/// round-robin, so slice `k` gets bands `k`, `k + count`, `k + 2 * count`
/// and so on.
pub fn tile_bands(index: usize, count: usize, height: usize, tile_height: usize) -> impl Iterator<Item = Range<usize>> {
    let tile = tile_height.max(1);
    let count = count.max(1);
    let bands = height.div_ceil(tile);
    (index..bands)
        .step_by(count)
        .map(move |b| b * tile..((b + 1) * tile).min(height))
}

/// Contiguous share of `0..total` owned by slice `index` of `count`.
///
/// Shares differ in length by at most one, earlier slices taking the
/// remainder.
pub fn slice_range(index: usize, count: usize, total: usize) -> Range<usize> {
    let count = count.max(1);
    if index >= count {
        return total..total;
    }
    let base = total / count;
    let extra = total % count;
    let start = index * base + index.min(extra);
    let len = base + usize::from(index < extra);
    start..start + len
}
