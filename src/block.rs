//! Row-generic upstream blocks.
//!
//! A record's backward routine is written once against [`UpstreamBlock`] and
//! is instantiated for every row-count class the dispatch chain hands it:
//! fixed blocks (`SMatrix<f64, R, COLS>`), dynamic-row views and fully
//! dynamic views. The product with a local derivative block stays in the
//! caller's row class, so a fixed upstream block yields a fixed product on the
//! stack.

use nalgebra::{Const, DMatrixView, Dyn, Matrix, MatrixView, SMatrix, VecStorage};

use crate::dispatch::Propagate;

/// Borrowed block with a run-time row count and `COLS` columns.
pub type DynRowsView<'a, const COLS: usize> = MatrixView<'a, f64, Dyn, Const<COLS>>;

/// Owned block with a run-time row count and `COLS` columns.
pub type DynRowsMatrix<const COLS: usize> =
    Matrix<f64, Dyn, Const<COLS>, VecStorage<f64, Dyn, Const<COLS>>>;

/// Row-count class of an upstream block, fixed by its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockClass {
    /// Row count known at compile time.
    Fixed(usize),
    /// Run-time row count, `COLS` columns known at compile time.
    DynamicRows,
    /// Run-time row and column counts.
    Dynamic,
}

/// Upstream derivative block `dF/dT` of some row-count class, for a node with
/// output dimension `COLS`.
pub trait UpstreamBlock<const COLS: usize>: Propagate<COLS> {
    /// `self · local` for a local block with `A` columns, in the same row class.
    type Product<const A: usize>: Propagate<A>;

    /// Which kind of dispatch entry point this block belongs to.
    const CLASS: BlockClass;

    /// Chain rule step: multiply by the local derivative `dT/dA`.
    fn times<const A: usize>(&self, local: &SMatrix<f64, COLS, A>) -> Self::Product<A>;

    /// Borrow as a fully dynamic view, e.g. to hand it to an accumulator.
    fn as_dyn_view(&self) -> DMatrixView<'_, f64>;
}

impl<const R: usize, const COLS: usize> UpstreamBlock<COLS> for SMatrix<f64, R, COLS> {
    type Product<const A: usize> = SMatrix<f64, R, A>;

    const CLASS: BlockClass = BlockClass::Fixed(R);

    #[inline]
    fn times<const A: usize>(&self, local: &SMatrix<f64, COLS, A>) -> SMatrix<f64, R, A> {
        self * local
    }

    #[inline]
    fn as_dyn_view(&self) -> DMatrixView<'_, f64> {
        MatrixView::from_slice_generic(self.as_slice(), Dyn(R), Dyn(COLS))
    }
}

impl<'a, const COLS: usize> UpstreamBlock<COLS> for DynRowsView<'a, COLS> {
    type Product<const A: usize> = DynRowsMatrix<A>;

    const CLASS: BlockClass = BlockClass::DynamicRows;

    #[inline]
    fn times<const A: usize>(&self, local: &SMatrix<f64, COLS, A>) -> DynRowsMatrix<A> {
        self * local
    }

    #[inline]
    fn as_dyn_view(&self) -> DMatrixView<'_, f64> {
        self.view((0, 0), (self.nrows(), COLS))
    }
}

impl<'a, const COLS: usize> UpstreamBlock<COLS> for DMatrixView<'a, f64> {
    type Product<const A: usize> = DynRowsMatrix<A>;

    const CLASS: BlockClass = BlockClass::Dynamic;

    #[inline]
    fn times<const A: usize>(&self, local: &SMatrix<f64, COLS, A>) -> DynRowsMatrix<A> {
        debug_assert_eq!(self.ncols(), COLS, "upstream block has the wrong width");
        self * local
    }

    #[inline]
    fn as_dyn_view(&self) -> DMatrixView<'_, f64> {
        *self
    }
}
