//! Per-node records of one evaluation and their backward-pass interface.
//!
//! A node author implements [`Record`]: a description, the root seeding step,
//! and one backward routine that is generic over the row count of the
//! upstream block. Every `Record` is a [`CallRecord`] through a blanket
//! implementation; the fixed-row and dynamic entry points of the
//! [dispatch chain](crate::dispatch) are derived from the generic routine.
//!
//! A type that does not supply the backward routine is rejected by the
//! compiler:
//!
//! ```compile_fail
//! use exprad::{Accumulator, CallRecord, Record};
//!
//! struct Incomplete;
//!
//! impl Record<2> for Incomplete {
//!     fn print(&self, indent: &str) -> String {
//!         format!("{indent}Incomplete\n")
//!     }
//! }
//!
//! let record: Box<dyn CallRecord<2>> = Box::new(Incomplete);
//! ```

use nalgebra::SMatrix;

use crate::block::UpstreamBlock;
use crate::dispatch::{Propagate, ReverseAdInterface};
use crate::jacobian_map::Accumulator;

/// Node-side contract: what a record type has to write.
///
/// `COLS` is the node's output dimension. Records are immutable once the
/// forward pass has built them.
pub trait Record<const COLS: usize>: Send + Sync {
    /// Human-readable description of this record and its arguments.
    fn print(&self, indent: &str) -> String;

    /// Start the backward pass at this node.
    ///
    /// The default seeds the generic routine with the `COLS x COLS` identity.
    fn start_reverse_ad(&self, jacobians: &mut dyn Accumulator) {
        self.reverse_ad(&SMatrix::<f64, COLS, COLS>::identity(), jacobians)
    }

    /// Propagate `d_f_d_t`, the derivative of the traversal root with respect
    /// to this node's output, into the accumulator.
    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, d_f_d_t: &B, jacobians: &mut dyn Accumulator);
}

/// Object-safe record of one node, as seen by its parent.
pub trait CallRecord<const COLS: usize>: ReverseAdInterface<COLS> + Send + Sync {
    /// Human-readable trace description. No side effects.
    fn describe(&self, indent: &str) -> String;

    /// Seed the backward pass at the traversal root.
    fn seed_backward_pass(&self, jacobians: &mut dyn Accumulator);
}

impl<T: Record<COLS>, const COLS: usize> CallRecord<COLS> for T {
    #[inline]
    fn describe(&self, indent: &str) -> String {
        Record::print(self, indent)
    }

    fn seed_backward_pass(&self, jacobians: &mut dyn Accumulator) {
        tracing::trace!(cols = COLS, "seeding backward pass");
        Record::start_reverse_ad(self, jacobians)
    }
}

impl<const COLS: usize> dyn CallRecord<COLS> + '_ {
    /// Propagate an upstream block through the entry point matching its
    /// row-count class.
    ///
    /// Blocks with more than [`MAX_VIRTUAL_STATIC_ROWS`](crate::MAX_VIRTUAL_STATIC_ROWS)
    /// rows take the dynamic-row entry point. Shapes are not validated.
    #[inline]
    pub fn propagate_backward<B: Propagate<COLS> + ?Sized>(
        &self,
        d_f_d_t: &B,
        jacobians: &mut dyn Accumulator,
    ) {
        d_f_d_t.propagate(self, jacobians)
    }
}
