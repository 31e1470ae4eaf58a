use crate::call_record::CallRecord;
use crate::dispatch::Propagate;
use crate::jacobian_map::{Accumulator, JacobianMap};

/// Run a full backward pass from `root` into a fresh [`JacobianMap`].
///
/// Each block in the result has `COLS` rows, one per output component of the
/// root.
///
/// ```
/// use exprad::records::{LeafRecord, UnaryRecord};
/// use nalgebra::Matrix2x3;
///
/// let d = Matrix2x3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
/// let root = UnaryRecord::<2, 3>::new(d, Box::new(LeafRecord::<3>::new(7)));
///
/// let jacobians = exprad::jacobians::<2>(&root);
/// assert_eq!(jacobians.get(7).unwrap().as_slice(), d.as_slice());
/// ```
pub fn jacobians<const COLS: usize>(root: &dyn CallRecord<COLS>) -> JacobianMap {
    let mut jacobians = JacobianMap::new();
    jacobians_into(root, &mut jacobians);
    tracing::debug!(
        cols = COLS,
        variables = jacobians.len(),
        "backward pass complete"
    );
    jacobians
}

/// Run a full backward pass from `root` into a caller-owned accumulator.
///
/// Contributions are added to whatever the accumulator already holds.
pub fn jacobians_into<const COLS: usize>(
    root: &dyn CallRecord<COLS>,
    jacobians: &mut dyn Accumulator,
) {
    root.seed_backward_pass(jacobians);
}

/// Vector-Jacobian product: propagate a caller-chosen upstream block `w`
/// (rows of weights over the root's outputs) instead of the identity.
///
/// The contribution for each variable is `w · ∂root/∂variable`.
pub fn vjp<const COLS: usize, B: Propagate<COLS> + ?Sized>(
    root: &dyn CallRecord<COLS>,
    w: &B,
    jacobians: &mut dyn Accumulator,
) {
    root.propagate_backward(w, jacobians);
}

/// Independent backward passes, one per root, each into its own map.
///
/// Records are immutable after the forward pass, so the traversals share
/// nothing and run in parallel.
#[cfg(feature = "parallel")]
pub fn jacobians_par<const COLS: usize>(roots: &[Box<dyn CallRecord<COLS>>]) -> Vec<JacobianMap> {
    use rayon::prelude::*;

    tracing::debug!(roots = roots.len(), "parallel backward passes");
    roots.par_iter().map(|root| jacobians(root.as_ref())).collect()
}
