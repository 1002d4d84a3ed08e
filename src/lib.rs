//! `studentst` provides the multivariate Student's t distribution on top of
//! `ndarray`: density evaluation, sampling, conditioning on observed
//! coordinates and marginals.
//!
//! ```
//! use ndarray::array;
//! use studentst::{Nu, StudentsT};
//!
//! let dist = StudentsT::new(array![0., 0.], array![[1., 0.], [0., 1.]], Nu::Finite(5.)).unwrap();
//! let cond = dist.condition(&[0], array![1.].view()).unwrap();
//! assert_eq!(cond.dim(), 1);
//! assert_eq!(cond.nu(), Nu::Finite(6.));
//! ```
//!
//! Two kinds of failure are kept apart. Violated preconditions (empty
//! location, mismatched shapes, invalid indices) panic. A scale matrix, or a
//! block of it, that fails Cholesky factorization is reported as a
//! [`FactorizationError`] and can be handled by the caller.
extern crate faer;
extern crate ndarray;
extern crate ndarray_rand;
extern crate statrs;

#[cfg(feature = "openblas-system")]
extern crate blas_src;

pub mod dist_util;
pub mod distributions;
pub mod error;
mod util;

pub use crate::distributions::{Nu, StudentsT, StudentsTParams};
pub use crate::error::FactorizationError;
