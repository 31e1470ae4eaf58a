//! Row-class conversion at the boundary between fixed and dynamic blocks.
//!
//! A block whose row count is known at compile time to exceed
//! [`MAX_VIRTUAL_STATIC_ROWS`] has no fixed entry point of its own, so it is
//! handed to the dynamic-row entry point instead. Conversion reinterprets the
//! contiguous column-major storage as a view; nothing is copied or allocated.

use nalgebra::{Const, DMatrix, DMatrixView, Dyn, MatrixView, SMatrix};

use crate::block::{DynRowsMatrix, DynRowsView};
use crate::MAX_VIRTUAL_STATIC_ROWS;

/// Whether a fixed block with `rows` rows must go through the dynamic-row
/// entry point.
#[inline]
pub const fn exceeds_static_rows(rows: usize) -> bool {
    rows > MAX_VIRTUAL_STATIC_ROWS
}

/// View a fixed-size block as a dynamic-row block over the same storage.
#[inline]
pub fn to_dynamic_rows<const R: usize, const C: usize>(
    block: &SMatrix<f64, R, C>,
) -> DynRowsView<'_, C> {
    MatrixView::from_slice_generic(block.as_slice(), Dyn(R), Const::<C>)
}

/// View an owned dynamic-row block.
#[inline]
pub fn dynamic_rows_view<const C: usize>(block: &DynRowsMatrix<C>) -> DynRowsView<'_, C> {
    MatrixView::from_slice_generic(block.as_slice(), Dyn(block.nrows()), Const::<C>)
}

/// View an owned fully-dynamic block.
#[inline]
pub fn dynamic_view(block: &DMatrix<f64>) -> DMatrixView<'_, f64> {
    MatrixView::from_slice_generic(block.as_slice(), Dyn(block.nrows()), Dyn(block.ncols()))
}
