#![allow(non_snake_case)]
//! Cholesky factorization and the block-matrix updates built on it
use crate::distributions::Nu;
use crate::error::FactorizationError;
use crate::util;
use faer::linalg::solvers::{Llt, LltError, Solve};
use faer::linalg::triangular_solve::solve_lower_triangular_in_place;
use faer::{Mat, MatRef, Par, Side};
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use statrs::function::gamma::ln_gamma;

impl From<LltError> for FactorizationError {
    fn from(err: LltError) -> Self {
        match err {
            LltError::NonPositivePivot { index } => {
                FactorizationError::NotPositiveDefinite { pivot: index }
            }
        }
    }
}

fn to_faer(a: ArrayView2<f64>) -> Mat<f64> {
    Mat::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn from_faer(m: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn column(b: ArrayView1<f64>) -> Mat<f64> {
    Mat::from_fn(b.len(), 1, |i, _| b[i])
}

/// Lower triangular Cholesky factor `L` of a symmetric positive definite
/// matrix `Σ = L·Lᵀ`.
///
/// Only the lower triangle of the input is read.
#[derive(Clone, Debug)]
pub struct LowerCholesky {
    llt: Llt<f64>,
    L: Array2<f64>,
}

impl LowerCholesky {
    /// Factorizes `sigma` with faer's blocked $LL^\top$.
    ///
    /// Fails on the first pivot that is not strictly positive and finite, so a
    /// matrix with NaN or infinite entries in its lower triangle never
    /// produces a factor.
    pub fn factorize(sigma: &Array2<f64>) -> Result<Self, FactorizationError> {
        assert_eq!(
            sigma.nrows(),
            sigma.ncols(),
            "studentst: matrix to factorize is not square"
        );
        let llt = Llt::<f64>::new(to_faer(sigma.view()).as_ref(), Side::Lower)?;
        let L = from_faer(llt.L());
        Ok(Self { llt, L })
    }

    pub fn dim(&self) -> usize {
        self.L.nrows()
    }

    /// The triangular factor; entries above the diagonal are zero.
    pub fn lower(&self) -> &Array2<f64> {
        &self.L
    }

    /// $\ln\det\Sigma = 2\sum_i \ln L_{ii}$
    pub fn ln_det(&self) -> f64 {
        2. * self.L.diag().mapv(f64::ln).sum()
    }

    /// Solves `L·x = b`.
    pub fn solve_lower(&self, b: ArrayView1<f64>) -> Array1<f64> {
        assert_eq!(b.len(), self.dim(), "studentst: input length mismatch");
        let mut x = column(b);
        solve_lower_triangular_in_place(self.llt.L(), x.as_mut(), Par::Seq);
        Array1::from_shape_fn(x.nrows(), |i| x[(i, 0)])
    }

    /// Solves `Σ·x = b`.
    pub fn solve_vec(&self, b: ArrayView1<f64>) -> Array1<f64> {
        assert_eq!(b.len(), self.dim(), "studentst: input length mismatch");
        let mut x = column(b);
        self.llt.solve_in_place(&mut x);
        Array1::from_shape_fn(x.nrows(), |i| x[(i, 0)])
    }

    /// Solves `Σ·X = B` for every column of `B` at once.
    pub fn solve_mat(&self, b: &Array2<f64>) -> Array2<f64> {
        assert_eq!(b.nrows(), self.dim(), "studentst: input size mismatch");
        let mut x = to_faer(b.view());
        self.llt.solve_in_place(&mut x);
        from_faer(x.as_ref())
    }

    /// Squared Mahalanobis distance $\mathrm{diff}^\top\Sigma^{-1}\mathrm{diff}$.
    pub fn mahalanobis_sq(&self, diff: ArrayView1<f64>) -> f64 {
        let z = self.solve_lower(diff);
        z.dot(&z)
    }
}

/// $\ln\Gamma(x + a) - \ln\Gamma(x)$ for $x > 0$, $a \ge 0$.
///
/// Past `x = 1e4` the two log-gamma values are large and nearly equal, so the
/// difference is taken from the Stirling series instead; it stays accurate for
/// any finite `x`.
pub fn ln_gamma_ratio(x: f64, a: f64) -> f64 {
    if x < 1e4 {
        return ln_gamma(x + a) - ln_gamma(x);
    }
    let xa = x + a;
    a * x.ln() + (xa - 0.5) * (a / x).ln_1p() - a + (1. / xa - 1. / x) / 12.
        - (1. / (xa * xa * xa) - 1. / (x * x * x)) / 360.
}

/// Parameters of the distribution over the unobserved coordinates given
/// `values` at the `observed` coordinates.
///
/// The Gaussian update is exact when `nu` is [`Nu::GaussianLimit`]; for a
/// finite `nu` the Schur complement is rescaled by the observed quadratic
/// form and `nu` grows by the number of observations.
pub fn conditional_params(
    observed: &[usize],
    values: ArrayView1<f64>,
    nu: Nu,
    loc: &Array1<f64>,
    scale: &Array2<f64>,
) -> Result<(Nu, Array1<f64>, Array2<f64>), FactorizationError> {
    let dim = loc.len();
    let unobserved = util::find_unobserved(observed, dim);
    assert!(!unobserved.is_empty(), "studentst: all dimensions observed");

    let mu1 = loc.select(Axis(0), &unobserved);
    let diff = &values - &loc.select(Axis(0), observed);

    let mut sigma11 = util::select_block(scale, &unobserved, &unobserved);
    let sigma22 = util::select_block(scale, observed, observed);
    let sigma21 = util::select_block(scale, observed, &unobserved);

    let chol = LowerCholesky::factorize(&sigma22).map_err(|err| {
        debug!("conditioning on {:?} failed: {}", observed, err);
        FactorizationError::ObservedBlock(Box::new(err))
    })?;

    // mu_1 + sigma_21ᵀ · sigma_22⁻¹ · (v - mu_2)
    let t = chol.solve_vec(diff.view());
    let new_loc = mu1 + sigma21.t().dot(&t);

    // sigma_11 - sigma_21ᵀ · sigma_22⁻¹ · sigma_21, upper triangle mirrored
    let correction = sigma21.t().dot(&chol.solve_mat(&sigma21));
    let unob = unobserved.len();
    for i in 0..unob {
        for j in i..unob {
            let v = sigma11[[i, j]] - correction[[i, j]];
            sigma11[[i, j]] = v;
            sigma11[[j, i]] = v;
        }
    }

    match nu {
        Nu::GaussianLimit => Ok((nu, new_loc, sigma11)),
        Nu::Finite(nu) => {
            let beta = diff.dot(&t);
            let ob = observed.len() as f64;
            sigma11 *= (nu + beta) / (nu + ob);
            Ok((Nu::Finite(nu + ob), new_loc, sigma11))
        }
    }
}
