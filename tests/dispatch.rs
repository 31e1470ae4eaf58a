use exprad::convert::to_dynamic_rows;
use exprad::dispatch::{
    ReverseAdInterface0, ReverseAdInterface1, ReverseAdInterface2, ReverseAdInterface3,
    ReverseAdInterface4,
};
use exprad::records::{LeafRecord, UnaryRecord};
use exprad::{CallRecord, DynRowsMatrix, JacobianMap, MAX_VIRTUAL_STATIC_ROWS};
use nalgebra::{DMatrix, Matrix1x2, Matrix1x3, Matrix3x2, SMatrix};

mod common;
use common::{block, leaf, Probe, RowClass};

fn unary<const COLS: usize, const A: usize>(seed: usize) -> Box<dyn CallRecord<COLS>> {
    Box::new(UnaryRecord::<COLS, A>::new(block(seed), leaf(1)))
}

/// Same upstream block through the fixed, dynamic-row and fully dynamic entry
/// points of a `COLS`-wide record.
fn entry_points_agree<const R: usize, const COLS: usize>(
    fixed_entry: impl Fn(&dyn CallRecord<COLS>, &SMatrix<f64, R, COLS>, &mut JacobianMap),
) {
    let root = unary::<COLS, 2>(3);
    let upstream = block::<R, COLS>(5);

    let mut fixed = JacobianMap::new();
    fixed_entry(root.as_ref(), &upstream, &mut fixed);

    let mut dynamic_rows = JacobianMap::new();
    root.reverse_ad_dynamic_rows(to_dynamic_rows(&upstream), &mut dynamic_rows);

    let full = DMatrix::from_column_slice(R, COLS, upstream.as_slice());
    let mut dynamic = JacobianMap::new();
    root.reverse_ad_dynamic(full.view((0, 0), (R, COLS)), &mut dynamic);

    assert_eq!(fixed.get(1).unwrap().shape(), (R, 2));
    assert_eq!(fixed, dynamic_rows);
    assert_eq!(fixed, dynamic);
}

#[test]
fn one_row_entry_matches_dynamic() {
    entry_points_agree::<1, 2>(|r, u, j| r.reverse_ad_1(u, j));
    entry_points_agree::<1, 3>(|r, u, j| r.reverse_ad_1(u, j));
    entry_points_agree::<1, 5>(|r, u, j| r.reverse_ad_1(u, j));
}

#[test]
fn two_row_entry_matches_dynamic() {
    entry_points_agree::<2, 2>(|r, u, j| r.reverse_ad_2(u, j));
    entry_points_agree::<2, 3>(|r, u, j| r.reverse_ad_2(u, j));
    entry_points_agree::<2, 5>(|r, u, j| r.reverse_ad_2(u, j));
}

#[test]
fn three_row_entry_matches_dynamic() {
    entry_points_agree::<3, 2>(|r, u, j| r.reverse_ad_3(u, j));
    entry_points_agree::<3, 3>(|r, u, j| r.reverse_ad_3(u, j));
    entry_points_agree::<3, 5>(|r, u, j| r.reverse_ad_3(u, j));
}

#[test]
fn four_row_entry_matches_dynamic() {
    entry_points_agree::<4, 2>(|r, u, j| r.reverse_ad_4(u, j));
    entry_points_agree::<4, 3>(|r, u, j| r.reverse_ad_4(u, j));
    entry_points_agree::<4, 5>(|r, u, j| r.reverse_ad_4(u, j));
}

#[test]
fn bound_is_four_rows() {
    assert_eq!(MAX_VIRTUAL_STATIC_ROWS, 4);
}

fn routed_class<const R: usize>() -> RowClass {
    let probe = Probe::<3>::new(9);
    let record: &dyn CallRecord<3> = &probe;
    let mut jacobians = JacobianMap::new();
    record.propagate_backward(&block::<R, 3>(1), &mut jacobians);
    let seen = probe.seen();
    assert_eq!(seen.len(), 1, "exactly one entry point per propagation");
    seen[0]
}

#[test]
fn fixed_blocks_up_to_bound_use_fixed_entries() {
    assert_eq!(routed_class::<1>(), RowClass::Fixed(1));
    assert_eq!(routed_class::<2>(), RowClass::Fixed(2));
    assert_eq!(routed_class::<3>(), RowClass::Fixed(3));
    assert_eq!(routed_class::<4>(), RowClass::Fixed(4));
}

#[test]
fn fixed_blocks_past_bound_use_dynamic_rows_entry() {
    assert_eq!(routed_class::<5>(), RowClass::DynamicRows(5));
    assert_eq!(routed_class::<6>(), RowClass::DynamicRows(6));
    assert_eq!(routed_class::<9>(), RowClass::DynamicRows(9));
}

#[test]
fn dynamic_blocks_keep_their_class() {
    let probe = Probe::<3>::new(9);
    let record: &dyn CallRecord<3> = &probe;

    // One map per block: each traversal keeps a single shape per key.
    let rows = DynRowsMatrix::<3>::from_fn(2, |r, c| (r + c) as f64);
    record.propagate_backward(&rows, &mut JacobianMap::new());
    let full = DMatrix::from_fn(3, 3, |r, c| (r * c) as f64);
    record.propagate_backward(&full, &mut JacobianMap::new());
    record.propagate_backward(&full.view((0, 0), (1, 3)), &mut JacobianMap::new());

    assert_eq!(
        probe.seen(),
        vec![
            RowClass::DynamicRows(2),
            RowClass::Dynamic(3),
            RowClass::Dynamic(1)
        ]
    );
}

#[test]
fn single_column_blocks_are_classified_by_type() {
    let probe = Probe::<1>::new(2);
    let record: &dyn CallRecord<1> = &probe;

    record.propagate_backward(&block::<3, 1>(0), &mut JacobianMap::new());
    let rows = DynRowsMatrix::<1>::from_fn(3, |r, _| r as f64);
    record.propagate_backward(&rows, &mut JacobianMap::new());
    let full = DMatrix::from_element(3, 1, 0.5);
    record.propagate_backward(&full, &mut JacobianMap::new());
    record.propagate_backward(&block::<7, 1>(0), &mut JacobianMap::new());

    assert_eq!(
        probe.seen(),
        vec![
            RowClass::Fixed(3),
            RowClass::DynamicRows(3),
            RowClass::Dynamic(3),
            RowClass::DynamicRows(7)
        ]
    );
}

#[test]
fn overflow_rows_match_direct_dynamic_computation() {
    let d = block::<3, 2>(4);
    let root: Box<dyn CallRecord<3>> = Box::new(UnaryRecord::<3, 2>::new(d, leaf(1)));
    let upstream = block::<6, 3>(2);

    let mut routed = JacobianMap::new();
    root.propagate_backward(&upstream, &mut routed);

    let mut direct = JacobianMap::new();
    root.reverse_ad_dynamic_rows(to_dynamic_rows(&upstream), &mut direct);

    let got = routed.get(1).unwrap();
    assert_eq!(got.shape(), (6, 2), "no rows may be dropped");
    assert_eq!(routed, direct);

    let dense = DMatrix::from_column_slice(6, 3, upstream.as_slice())
        * DMatrix::from_column_slice(3, 2, d.as_slice());
    assert_eq!(got, &dense);
}

#[test]
fn one_by_three_upstream_through_three_by_two_local() {
    let d = Matrix3x2::new(1.0, 2.0, -1.0, 0.5, 3.0, 0.0);
    let u = Matrix1x3::new(2.0, -1.0, 0.25);
    let root: Box<dyn CallRecord<3>> =
        Box::new(UnaryRecord::<3, 2>::new(d, Box::new(LeafRecord::<2>::new(4))));

    let mut fixed = JacobianMap::new();
    root.propagate_backward(&u, &mut fixed);

    let mut dynamic = JacobianMap::new();
    root.propagate_backward(&to_dynamic_rows(&u), &mut dynamic);

    let expected = u * d;
    assert_eq!(expected, Matrix1x2::new(3.75, 3.5));
    assert_eq!(fixed.get(4).unwrap().as_slice(), expected.as_slice());
    assert_eq!(fixed, dynamic);
}
