//! Accumulation of per-variable Jacobian blocks during the backward pass.
//!
//! The backward pass only ever talks to the [`Accumulator`] trait. Callers own
//! the accumulator and keep it alive for the whole traversal; records never
//! hold on to it. [`JacobianMap`] is the ordered, dense implementation used by
//! the traversal drivers in [`crate::api`].

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use nalgebra::{DMatrix, DMatrixView};

use crate::error::AdError;

/// Identifier of an optimization variable.
pub type Key = u64;

/// Sink for keyed derivative contributions.
///
/// Combining is additive: a contribution for a key that already holds a block
/// is added to it, otherwise it is inserted. Nothing is ever removed.
pub trait Accumulator {
    /// Add `block` to the contribution stored under `key`.
    fn add_contribution(&mut self, key: Key, block: DMatrixView<'_, f64>);
}

/// Ordered map from variable key to its accumulated Jacobian block.
///
/// Every block of one traversal has as many rows as the root's output
/// dimension and as many columns as the variable's dimension.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JacobianMap {
    blocks: BTreeMap<Key, DMatrix<f64>>,
}

impl JacobianMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map with zero blocks pre-registered for every `(key, dim)`.
    ///
    /// A traversal into a pre-registered map only adds in place, so it never
    /// touches the allocator for fixed-size upstream blocks.
    pub fn with_dims(rows: usize, dims: &[(Key, usize)]) -> Self {
        let blocks = dims
            .iter()
            .map(|&(key, cols)| (key, DMatrix::zeros(rows, cols)))
            .collect();
        JacobianMap { blocks }
    }

    /// Block accumulated for `key`, if any.
    pub fn get(&self, key: Key) -> Option<&DMatrix<f64>> {
        self.blocks.get(&key)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.blocks.contains_key(&key)
    }

    /// Number of variables holding a block.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.blocks.keys().copied()
    }

    /// `(key, block)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &DMatrix<f64>)> + '_ {
        self.blocks.iter().map(|(&k, b)| (k, b))
    }

    /// Zero every block in place, keeping keys and storage for the next
    /// evaluation.
    pub fn clear(&mut self) {
        for block in self.blocks.values_mut() {
            block.fill(0.0);
        }
    }

    /// Checked variant of [`Accumulator::add_contribution`].
    ///
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] if `key` already holds a block of a
    /// different shape. The map is left unchanged in that case.
    pub fn try_add(&mut self, key: Key, block: DMatrixView<'_, f64>) -> Result<(), AdError> {
        if let Some(existing) = self.blocks.get(&key) {
            if existing.shape() != block.shape() {
                tracing::warn!(
                    key,
                    expected = ?existing.shape(),
                    actual = ?block.shape(),
                    "rejecting contribution with mismatched shape"
                );
                return Err(AdError::ShapeMismatch {
                    key,
                    expected: existing.shape(),
                    actual: block.shape(),
                });
            }
        }
        self.add_contribution(key, block);
        Ok(())
    }

    /// Fold another partial map into this one.
    ///
    /// This is the merge step for traversals that accumulated into separate
    /// partitions.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] on the first key whose shapes
    /// disagree. Keys merged before the failure stay merged.
    pub fn merge(&mut self, other: JacobianMap) -> Result<(), AdError> {
        tracing::debug!(
            into = self.blocks.len(),
            from = other.blocks.len(),
            "merging jacobian maps"
        );
        for (key, block) in other.blocks {
            match self.blocks.entry(key) {
                btree_map::Entry::Occupied(mut entry) => {
                    let target = entry.get_mut();
                    if target.shape() != block.shape() {
                        tracing::warn!(key, "shape mismatch while merging jacobian maps");
                        return Err(AdError::ShapeMismatch {
                            key,
                            expected: target.shape(),
                            actual: block.shape(),
                        });
                    }
                    *target += block;
                }
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(block);
                }
            }
        }
        Ok(())
    }

    /// Concatenate the blocks of `keys` horizontally, in the given order.
    ///
    /// This is the dense Jacobian of a factor over its ordered variables.
    ///
    /// # Errors
    ///
    /// [`AdError::MissingVariable`] if a key holds no block,
    /// [`AdError::ShapeMismatch`] if row counts disagree.
    pub fn stack(&self, keys: &[Key]) -> Result<DMatrix<f64>, AdError> {
        let mut rows = None;
        let mut total_cols = 0;
        for &key in keys {
            let block = self.blocks.get(&key).ok_or(AdError::MissingVariable(key))?;
            match rows {
                None => rows = Some(block.nrows()),
                Some(r) if r != block.nrows() => {
                    return Err(AdError::ShapeMismatch {
                        key,
                        expected: (r, block.ncols()),
                        actual: block.shape(),
                    });
                }
                Some(_) => {}
            }
            total_cols += block.ncols();
        }

        let mut stacked = DMatrix::zeros(rows.unwrap_or(0), total_cols);
        let mut offset = 0;
        for &key in keys {
            // Presence checked above.
            if let Some(block) = self.blocks.get(&key) {
                stacked.columns_mut(offset, block.ncols()).copy_from(block);
                offset += block.ncols();
            }
        }
        Ok(stacked)
    }
}

impl Accumulator for JacobianMap {
    #[inline]
    fn add_contribution(&mut self, key: Key, block: DMatrixView<'_, f64>) {
        match self.blocks.entry(key) {
            btree_map::Entry::Occupied(mut entry) => {
                let target = entry.get_mut();
                debug_assert_eq!(
                    target.shape(),
                    block.shape(),
                    "contribution for key {} has the wrong shape",
                    key
                );
                *target += block;
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(block.clone_owned());
            }
        }
    }
}

impl fmt::Display for JacobianMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, block) in &self.blocks {
            write!(f, "{}:", key)?;
            for r in 0..block.nrows() {
                write!(f, "{}", if r == 0 { " [" } else { "; " })?;
                for c in 0..block.ncols() {
                    if c > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", block[(r, c)])?;
                }
            }
            writeln!(f, "{}", if block.nrows() == 0 { " []" } else { "]" })?;
        }
        Ok(())
    }
}
