//! Stock records for the nodes an expression tree is made of.
//!
//! Leaves and constants end the recursion. Function records keep the local
//! derivative `dT/dAi` of their output with respect to each argument together
//! with the argument's own record, and apply the chain rule on the way back.

use std::fmt::Write as _;

use nalgebra::{Dim, Matrix, RawStorage, SMatrix};

use crate::block::UpstreamBlock;
use crate::call_record::{CallRecord, Record};
use crate::jacobian_map::{Accumulator, Key};

/// Boxed record of an argument with output dimension `A`.
pub type ArgRecord<const A: usize> = Box<dyn CallRecord<A>>;

/// Leaf for an optimization variable of dimension `COLS`.
///
/// Whatever reaches a leaf is that variable's contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafRecord<const COLS: usize> {
    key: Key,
}

impl<const COLS: usize> LeafRecord<COLS> {
    pub fn new(key: Key) -> Self {
        LeafRecord { key }
    }

    pub fn key(&self) -> Key {
        self.key
    }
}

impl<const COLS: usize> Record<COLS> for LeafRecord<COLS> {
    fn print(&self, indent: &str) -> String {
        format!("{indent}Leaf({})\n", self.key)
    }

    #[inline]
    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, d_f_d_t: &B, jacobians: &mut dyn Accumulator) {
        jacobians.add_contribution(self.key, d_f_d_t.as_dyn_view());
    }
}

/// Constant of dimension `COLS`; contributes nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConstantRecord<const COLS: usize>;

impl<const COLS: usize> Record<COLS> for ConstantRecord<COLS> {
    fn print(&self, indent: &str) -> String {
        format!("{indent}Constant\n")
    }

    fn start_reverse_ad(&self, _jacobians: &mut dyn Accumulator) {}

    #[inline]
    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, _d_f_d_t: &B, _jacobians: &mut dyn Accumulator) {}
}

/// Function of one argument.
pub struct UnaryRecord<const COLS: usize, const A1: usize> {
    d_t_d_a1: SMatrix<f64, COLS, A1>,
    trace1: ArgRecord<A1>,
}

impl<const COLS: usize, const A1: usize> UnaryRecord<COLS, A1> {
    pub fn new(d_t_d_a1: SMatrix<f64, COLS, A1>, trace1: ArgRecord<A1>) -> Self {
        UnaryRecord { d_t_d_a1, trace1 }
    }
}

impl<const COLS: usize, const A1: usize> Record<COLS> for UnaryRecord<COLS, A1> {
    fn print(&self, indent: &str) -> String {
        let inner = format!("{indent}  ");
        let mut out = format!("{indent}UnaryRecord {{\n");
        print_argument(&mut out, &inner, 1, &self.d_t_d_a1, self.trace1.describe(&inner));
        out.push_str(indent);
        out.push_str("}\n");
        out
    }

    /// The identity seed times `dT/dA1` is `dT/dA1` itself.
    fn start_reverse_ad(&self, jacobians: &mut dyn Accumulator) {
        self.trace1.propagate_backward(&self.d_t_d_a1, jacobians);
    }

    #[inline]
    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, d_f_d_t: &B, jacobians: &mut dyn Accumulator) {
        self.trace1
            .propagate_backward(&d_f_d_t.times(&self.d_t_d_a1), jacobians);
    }
}

/// Function of two arguments.
pub struct BinaryRecord<const COLS: usize, const A1: usize, const A2: usize> {
    d_t_d_a1: SMatrix<f64, COLS, A1>,
    d_t_d_a2: SMatrix<f64, COLS, A2>,
    trace1: ArgRecord<A1>,
    trace2: ArgRecord<A2>,
}

impl<const COLS: usize, const A1: usize, const A2: usize> BinaryRecord<COLS, A1, A2> {
    pub fn new(
        d_t_d_a1: SMatrix<f64, COLS, A1>,
        trace1: ArgRecord<A1>,
        d_t_d_a2: SMatrix<f64, COLS, A2>,
        trace2: ArgRecord<A2>,
    ) -> Self {
        BinaryRecord {
            d_t_d_a1,
            d_t_d_a2,
            trace1,
            trace2,
        }
    }
}

impl<const COLS: usize, const A1: usize, const A2: usize> Record<COLS>
    for BinaryRecord<COLS, A1, A2>
{
    fn print(&self, indent: &str) -> String {
        let inner = format!("{indent}  ");
        let mut out = format!("{indent}BinaryRecord {{\n");
        print_argument(&mut out, &inner, 1, &self.d_t_d_a1, self.trace1.describe(&inner));
        print_argument(&mut out, &inner, 2, &self.d_t_d_a2, self.trace2.describe(&inner));
        out.push_str(indent);
        out.push_str("}\n");
        out
    }

    fn start_reverse_ad(&self, jacobians: &mut dyn Accumulator) {
        self.trace1.propagate_backward(&self.d_t_d_a1, jacobians);
        self.trace2.propagate_backward(&self.d_t_d_a2, jacobians);
    }

    #[inline]
    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, d_f_d_t: &B, jacobians: &mut dyn Accumulator) {
        self.trace1
            .propagate_backward(&d_f_d_t.times(&self.d_t_d_a1), jacobians);
        self.trace2
            .propagate_backward(&d_f_d_t.times(&self.d_t_d_a2), jacobians);
    }
}

/// Function of three arguments.
pub struct TernaryRecord<const COLS: usize, const A1: usize, const A2: usize, const A3: usize> {
    d_t_d_a1: SMatrix<f64, COLS, A1>,
    d_t_d_a2: SMatrix<f64, COLS, A2>,
    d_t_d_a3: SMatrix<f64, COLS, A3>,
    trace1: ArgRecord<A1>,
    trace2: ArgRecord<A2>,
    trace3: ArgRecord<A3>,
}

impl<const COLS: usize, const A1: usize, const A2: usize, const A3: usize>
    TernaryRecord<COLS, A1, A2, A3>
{
    pub fn new(
        (d_t_d_a1, trace1): (SMatrix<f64, COLS, A1>, ArgRecord<A1>),
        (d_t_d_a2, trace2): (SMatrix<f64, COLS, A2>, ArgRecord<A2>),
        (d_t_d_a3, trace3): (SMatrix<f64, COLS, A3>, ArgRecord<A3>),
    ) -> Self {
        TernaryRecord {
            d_t_d_a1,
            d_t_d_a2,
            d_t_d_a3,
            trace1,
            trace2,
            trace3,
        }
    }
}

impl<const COLS: usize, const A1: usize, const A2: usize, const A3: usize> Record<COLS>
    for TernaryRecord<COLS, A1, A2, A3>
{
    fn print(&self, indent: &str) -> String {
        let inner = format!("{indent}  ");
        let mut out = format!("{indent}TernaryRecord {{\n");
        print_argument(&mut out, &inner, 1, &self.d_t_d_a1, self.trace1.describe(&inner));
        print_argument(&mut out, &inner, 2, &self.d_t_d_a2, self.trace2.describe(&inner));
        print_argument(&mut out, &inner, 3, &self.d_t_d_a3, self.trace3.describe(&inner));
        out.push_str(indent);
        out.push_str("}\n");
        out
    }

    fn start_reverse_ad(&self, jacobians: &mut dyn Accumulator) {
        self.trace1.propagate_backward(&self.d_t_d_a1, jacobians);
        self.trace2.propagate_backward(&self.d_t_d_a2, jacobians);
        self.trace3.propagate_backward(&self.d_t_d_a3, jacobians);
    }

    #[inline]
    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, d_f_d_t: &B, jacobians: &mut dyn Accumulator) {
        self.trace1
            .propagate_backward(&d_f_d_t.times(&self.d_t_d_a1), jacobians);
        self.trace2
            .propagate_backward(&d_f_d_t.times(&self.d_t_d_a2), jacobians);
        self.trace3
            .propagate_backward(&d_f_d_t.times(&self.d_t_d_a3), jacobians);
    }
}

/// Sum of any number of terms with the same dimension.
///
/// Every summand has the identity as its local derivative, so the upstream
/// block is handed on unchanged.
pub struct SumRecord<const COLS: usize> {
    terms: Vec<ArgRecord<COLS>>,
}

impl<const COLS: usize> SumRecord<COLS> {
    pub fn new(terms: Vec<ArgRecord<COLS>>) -> Self {
        SumRecord { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<const COLS: usize> Record<COLS> for SumRecord<COLS> {
    fn print(&self, indent: &str) -> String {
        let inner = format!("{indent}  ");
        let mut out = format!("{indent}SumRecord {{\n");
        for term in &self.terms {
            out.push_str(&term.describe(&inner));
        }
        out.push_str(indent);
        out.push_str("}\n");
        out
    }

    #[inline]
    fn reverse_ad<B: UpstreamBlock<COLS>>(&self, d_f_d_t: &B, jacobians: &mut dyn Accumulator) {
        for term in &self.terms {
            term.propagate_backward(d_f_d_t, jacobians);
        }
    }
}

fn print_argument<R: Dim, C: Dim, S: RawStorage<f64, R, C>>(
    out: &mut String,
    indent: &str,
    index: usize,
    d_t_d_a: &Matrix<f64, R, C, S>,
    argument: String,
) {
    let _ = write!(out, "{indent}dTdA{index} = ");
    write_block(out, d_t_d_a);
    out.push('\n');
    out.push_str(&argument);
}

/// `[a, b; c, d]`, row by row.
fn write_block<R: Dim, C: Dim, S: RawStorage<f64, R, C>>(out: &mut String, m: &Matrix<f64, R, C, S>) {
    out.push('[');
    for r in 0..m.nrows() {
        if r > 0 {
            out.push_str("; ");
        }
        for c in 0..m.ncols() {
            if c > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}", m[(r, c)]);
        }
    }
    out.push(']');
}
