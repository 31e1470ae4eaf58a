//! Reverse-mode Jacobian propagation over per-evaluation expression records.
//!
//! The forward pass of an expression leaves behind one record per node,
//! holding the node's local derivative blocks. The backward pass starts at
//! the root with an identity seed and pushes an upstream block `dF/dT` down
//! the tree; leaves add what reaches them into an [`Accumulator`].
//!
//! Upstream blocks with a small row count stay fixed-size all the way down:
//! each record exposes an entry point per row count up to
//! [`MAX_VIRTUAL_STATIC_ROWS`], plus dynamic-row and fully dynamic entry
//! points. A record type writes a single generic [`Record::reverse_ad`]; the
//! [`dispatch`] chain derives the rest.
//!
//! ```
//! use exprad::records::{BinaryRecord, LeafRecord};
//! use exprad::CallRecord;
//! use nalgebra::{Matrix1x2, Matrix1x3};
//!
//! // f(x, y) = 2 x0 + x1 - y0 + 3 y2, a scalar of a 2-vector and a 3-vector.
//! let root: Box<dyn CallRecord<1>> = Box::new(BinaryRecord::<1, 2, 3>::new(
//!     Matrix1x2::new(2.0, 1.0),
//!     Box::new(LeafRecord::<2>::new(0)),
//!     Matrix1x3::new(-1.0, 0.0, 3.0),
//!     Box::new(LeafRecord::<3>::new(1)),
//! ));
//!
//! let jacobians = exprad::jacobians(root.as_ref());
//! assert_eq!(jacobians.get(0).unwrap().as_slice(), &[2.0, 1.0]);
//! assert_eq!(jacobians.get(1).unwrap().as_slice(), &[-1.0, 0.0, 3.0]);
//! ```

pub mod api;
pub mod block;
pub mod call_record;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod jacobian_map;
pub mod records;

pub use api::{jacobians, jacobians_into, vjp};
#[cfg(feature = "parallel")]
pub use api::jacobians_par;
pub use block::{BlockClass, DynRowsMatrix, DynRowsView, UpstreamBlock};
pub use call_record::{CallRecord, Record};
pub use dispatch::{Propagate, MAX_VIRTUAL_STATIC_ROWS};
pub use error::{check_component_count, AdError};
pub use jacobian_map::{Accumulator, JacobianMap, Key};
