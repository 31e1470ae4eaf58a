#![allow(dead_code)]

use std::sync::Mutex;

use exprad::records::{ArgRecord, LeafRecord};
use exprad::{Accumulator, BlockClass, Key, Record, UpstreamBlock};
use nalgebra::{DMatrix, SMatrix};

/// Boxed leaf for a variable of dimension `N`.
pub fn leaf<const N: usize>(key: Key) -> ArgRecord<N> {
    Box::new(LeafRecord::<N>::new(key))
}

/// Deterministic block with small dyadic entries, so products are exact.
pub fn block<const R: usize, const C: usize>(seed: usize) -> SMatrix<f64, R, C> {
    SMatrix::from_fn(|r, c| ((r * 7 + c * 3 + seed) % 11) as f64 * 0.25 - 1.0)
}

/// Heap copy of a fixed block, for dense reference products.
pub fn dense<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> DMatrix<f64> {
    DMatrix::from_column_slice(R, C, m.as_slice())
}

/// Which kind of block reached a record's backward routine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowClass {
    Fixed(usize),
    DynamicRows(usize),
    Dynamic(usize),
}

/// Leaf-like record that remembers the row class of every block it receives.
pub struct Probe<const COLS: usize> {
    key: Key,
    seen: Mutex<Vec<RowClass>>,
}

impl<const COLS: usize> Probe<COLS> {
    pub fn new(key: Key) -> Self {
        Probe {
            key,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<RowClass> {
        self.seen.lock().unwrap().clone()
    }
}

impl<const COLS: usize> Record<COLS> for Probe<COLS> {
    fn print(&self, indent: &str) -> String {
        format!("{indent}Probe({})\n", self.key)
    }

    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, d_f_d_t: &B, jacobians: &mut dyn Accumulator) {
        let view = d_f_d_t.as_dyn_view();
        let rows = view.nrows();
        let class = match B::CLASS {
            BlockClass::Fixed(_) => RowClass::Fixed(rows),
            BlockClass::DynamicRows => RowClass::DynamicRows(rows),
            BlockClass::Dynamic => RowClass::Dynamic(rows),
        };
        self.seen.lock().unwrap().push(class);
        jacobians.add_contribution(self.key, view);
    }
}
