//! The dispatch chain: one backward entry point per row-count class.
//!
//! A record with output dimension `COLS` exposes
//!
//! - `reverse_ad_1` .. `reverse_ad_K` for fixed blocks with 1..K rows,
//! - [`reverse_ad_dynamic_rows`](ReverseAdInterface0::reverse_ad_dynamic_rows)
//!   for blocks whose row count is only known at run time,
//! - [`reverse_ad_dynamic`](ReverseAdInterface0::reverse_ad_dynamic) for
//!   fully dynamic blocks,
//!
//! where K is [`MAX_VIRTUAL_STATIC_ROWS`](crate::MAX_VIRTUAL_STATIC_ROWS).
//!
//! The interface is built in levels: level 0 holds the two dynamic entry
//! points and level `n` extends level `n - 1` with the `n`-row entry point.
//! Every level comes with a blanket implementation that forwards to
//! [`Record::reverse_ad`], so a record type gets the whole set from its one
//! generic routine and cannot end up with a missing entry point.
//!
//! [`Propagate`] picks the entry point for a concrete block type. For fixed
//! blocks the choice is made from the row count at compile time; blocks with
//! more than K rows are reinterpreted as dynamic-row views first.

use std::any::Any;

use nalgebra::{DMatrix, DMatrixView, SMatrix};

use crate::block::{DynRowsMatrix, DynRowsView};
use crate::call_record::{CallRecord, Record};
use crate::convert::{dynamic_rows_view, dynamic_view, exceeds_static_rows, to_dynamic_rows};
use crate::jacobian_map::Accumulator;

/// Base level of the dispatch chain: the dynamic entry points.
pub trait ReverseAdInterface0<const COLS: usize> {
    fn reverse_ad_dynamic_rows(&self, d_f_d_t: DynRowsView<'_, COLS>, jacobians: &mut dyn Accumulator);

    fn reverse_ad_dynamic(&self, d_f_d_t: DMatrixView<'_, f64>, jacobians: &mut dyn Accumulator);
}

impl<T: Record<COLS>, const COLS: usize> ReverseAdInterface0<COLS> for T {
    #[inline]
    fn reverse_ad_dynamic_rows(&self, d_f_d_t: DynRowsView<'_, COLS>, jacobians: &mut dyn Accumulator) {
        Record::reverse_ad(self, &d_f_d_t, jacobians)
    }

    #[inline]
    fn reverse_ad_dynamic(&self, d_f_d_t: DMatrixView<'_, f64>, jacobians: &mut dyn Accumulator) {
        Record::reverse_ad(self, &d_f_d_t, jacobians)
    }
}

/// Builds the fixed-row levels on top of `$base`, one per `Level(rows, entry)`.
///
/// The last level is re-exported as `ReverseAdInterface`, and the router that
/// sends fixed blocks to their entry point is generated from the same list.
macro_rules! reverse_ad_chain {
    ($base:ident; $($level:ident($rows:literal, $entry:ident)),+ $(,)?) => {
        reverse_ad_chain!(@levels $base; $($level($rows, $entry)),+);

        /// Number of row counts with a fixed entry point of their own.
        pub const MAX_VIRTUAL_STATIC_ROWS: usize = [$($rows),+].len();

        /// Send a fixed block with at most K rows to its own entry point.
        ///
        /// The cascade compares `TypeId`s that are constant per
        /// instantiation. Optimized builds fold it to a single direct call;
        /// unoptimized builds pay up to K comparisons per propagation.
        #[inline]
        fn route_static<const R: usize, const COLS: usize>(
            d_f_d_t: &SMatrix<f64, R, COLS>,
            record: &(dyn CallRecord<COLS> + '_),
            jacobians: &mut dyn Accumulator,
        ) {
            let block: &dyn Any = d_f_d_t;
            $(
                if let Some(d_f_d_t) = block.downcast_ref::<SMatrix<f64, $rows, COLS>>() {
                    return record.$entry(d_f_d_t, jacobians);
                }
            )+
            // Only an empty block gets here.
            record.reverse_ad_dynamic_rows(to_dynamic_rows(d_f_d_t), jacobians)
        }
    };

    (@levels $prev:ident;) => {
        /// The complete dispatch chain.
        pub use self::$prev as ReverseAdInterface;
    };

    (@levels $prev:ident; $level:ident($rows:literal, $entry:ident) $(, $rest:ident($rest_rows:literal, $rest_entry:ident))*) => {
        #[doc = concat!("Dispatch level adding the ", stringify!($rows), "-row entry point.")]
        pub trait $level<const COLS: usize>: $prev<COLS> {
            fn $entry(&self, d_f_d_t: &SMatrix<f64, $rows, COLS>, jacobians: &mut dyn Accumulator);
        }

        impl<T: Record<COLS>, const COLS: usize> $level<COLS> for T {
            #[inline]
            fn $entry(&self, d_f_d_t: &SMatrix<f64, $rows, COLS>, jacobians: &mut dyn Accumulator) {
                Record::reverse_ad(self, d_f_d_t, jacobians)
            }
        }

        reverse_ad_chain!(@levels $level; $($rest($rest_rows, $rest_entry)),*);
    };
}

reverse_ad_chain!(
    ReverseAdInterface0;
    ReverseAdInterface1(1, reverse_ad_1),
    ReverseAdInterface2(2, reverse_ad_2),
    ReverseAdInterface3(3, reverse_ad_3),
    ReverseAdInterface4(4, reverse_ad_4),
);

/// A block that knows which entry point of a `COLS`-wide record accepts it.
pub trait Propagate<const COLS: usize> {
    fn propagate(&self, record: &(dyn CallRecord<COLS> + '_), jacobians: &mut dyn Accumulator);
}

impl<const R: usize, const COLS: usize> Propagate<COLS> for SMatrix<f64, R, COLS> {
    #[inline]
    fn propagate(&self, record: &(dyn CallRecord<COLS> + '_), jacobians: &mut dyn Accumulator) {
        if exceeds_static_rows(R) {
            tracing::trace!(rows = R, cols = COLS, "fixed block routed to dynamic-row entry");
            record.reverse_ad_dynamic_rows(to_dynamic_rows(self), jacobians)
        } else {
            route_static(self, record, jacobians)
        }
    }
}

impl<'a, const COLS: usize> Propagate<COLS> for DynRowsView<'a, COLS> {
    #[inline]
    fn propagate(&self, record: &(dyn CallRecord<COLS> + '_), jacobians: &mut dyn Accumulator) {
        record.reverse_ad_dynamic_rows(*self, jacobians)
    }
}

impl<const COLS: usize> Propagate<COLS> for DynRowsMatrix<COLS> {
    #[inline]
    fn propagate(&self, record: &(dyn CallRecord<COLS> + '_), jacobians: &mut dyn Accumulator) {
        record.reverse_ad_dynamic_rows(dynamic_rows_view(self), jacobians)
    }
}

impl<'a, const COLS: usize> Propagate<COLS> for DMatrixView<'a, f64> {
    #[inline]
    fn propagate(&self, record: &(dyn CallRecord<COLS> + '_), jacobians: &mut dyn Accumulator) {
        record.reverse_ad_dynamic(*self, jacobians)
    }
}

impl<const COLS: usize> Propagate<COLS> for DMatrix<f64> {
    #[inline]
    fn propagate(&self, record: &(dyn CallRecord<COLS> + '_), jacobians: &mut dyn Accumulator) {
        record.reverse_ad_dynamic(dynamic_view(self), jacobians)
    }
}
