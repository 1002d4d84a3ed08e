//! High level distributions
use crate::dist_util::{conditional_params, ln_gamma_ratio, LowerCholesky};
use crate::error::FactorizationError;
use crate::util;
use log::{debug, trace};
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use ndarray_rand::rand_distr::{ChiSquared, StandardNormal};
use ndarray_rand::RandomExt;
use num::traits::FloatConst;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Degrees of freedom of a [`StudentsT`]
///
/// `GaussianLimit` stands for $\nu = \infty$, where the distribution is the
/// multivariate normal $N(\mu, \Sigma)$. Any finite value above 2 is usable;
/// the density stays within rounding of the Gaussian one as $\nu$ grows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Nu {
    Finite(f64),
    GaussianLimit,
}

impl Nu {
    /// The value as a float, `f64::INFINITY` in the Gaussian limit.
    pub fn value(self) -> f64 {
        match self {
            Nu::Finite(nu) => nu,
            Nu::GaussianLimit => f64::INFINITY,
        }
    }

    pub fn is_gaussian_limit(self) -> bool {
        matches!(self, Nu::GaussianLimit)
    }
}

impl From<f64> for Nu {
    /// Positive infinity maps to [`Nu::GaussianLimit`], anything else to
    /// [`Nu::Finite`].
    fn from(nu: f64) -> Self {
        if nu == f64::INFINITY {
            Nu::GaussianLimit
        } else {
            Nu::Finite(nu)
        }
    }
}

/// Multivariate Student's t distribution over $\mathbb{R}^n$ with density
///
/// $$
/// p(y) = \frac{\Gamma((\nu+n)/2)}{\Gamma(\nu/2)} (\nu\pi)^{-n/2} |\Sigma|^{-1/2}
///        \left(1 + \frac{1}{\nu}(y-\mu)^\top\Sigma^{-1}(y-\mu)\right)^{-(\nu+n)/2}
/// $$
///
/// where $\nu > 2$, $\mu \in \mathbb{R}^n$ and $\Sigma$ is symmetric positive
/// definite. The mean is $\mu$ and the covariance is $\frac{\nu}{\nu-2}\Sigma$.
/// As $\nu \to \infty$ the distribution approaches $N(\mu, \Sigma)$, which is
/// available exactly through [`Nu::GaussianLimit`].
///
/// Values are immutable. Conditioning and marginalizing build new, independent
/// distributions. No random source is stored; every draw takes the caller's
/// `Rng`.
#[derive(Clone, Debug)]
pub struct StudentsT {
    loc: Array1<f64>,
    scale: Array2<f64>,
    nu: Nu,
    chol: LowerCholesky,
    ln_sqrt_det: f64,
    mixing: Option<ChiSquared<f64>>,
}

/// Serializable snapshot of the parameters of a [`StudentsT`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentsTParams {
    pub loc: Array1<f64>,
    pub scale: Array2<f64>,
    pub nu: Nu,
}

impl StudentsT {
    /// Builds the distribution, factorizing `scale`.
    ///
    /// Only the lower triangle of `scale` is read. Returns an error when the
    /// factorization finds `scale` is not positive definite.
    ///
    /// # Panics
    ///
    /// If `loc` is empty, if `scale` is not `loc.len()` square, or if a finite
    /// `nu` is not greater than 2.
    pub fn new(
        loc: Array1<f64>,
        mut scale: Array2<f64>,
        nu: Nu,
    ) -> Result<Self, FactorizationError> {
        assert!(!loc.is_empty(), "studentst: zero dimension");
        let dim = loc.len();
        assert_eq!(
            scale.shape(),
            &[dim, dim],
            "studentst: scale must be a {}x{} matrix",
            dim,
            dim
        );
        let mixing = match nu {
            Nu::Finite(nu) => {
                assert!(
                    nu.is_finite() && nu > 2.,
                    "studentst: degrees of freedom must be finite and greater than 2, got {}",
                    nu
                );
                Some(ChiSquared::new(nu).expect("degrees of freedom are positive"))
            }
            Nu::GaussianLimit => None,
        };

        util::mirror_lower(&mut scale);
        let chol = LowerCholesky::factorize(&scale).map_err(|err| {
            debug!("failed to build {}-dimensional StudentsT: {}", dim, err);
            err
        })?;
        let ln_sqrt_det = 0.5 * chol.ln_det();
        trace!("built {}-dimensional StudentsT with nu = {:?}", dim, nu);
        Ok(Self {
            loc,
            scale,
            nu,
            chol,
            ln_sqrt_det,
            mixing,
        })
    }

    /// Rebuilds a distribution from a parameter snapshot.
    pub fn from_params(params: &StudentsTParams) -> Result<Self, FactorizationError> {
        Self::new(params.loc.clone(), params.scale.clone(), params.nu)
    }

    pub fn params(&self) -> StudentsTParams {
        StudentsTParams {
            loc: self.loc.clone(),
            scale: self.scale.clone(),
            nu: self.nu,
        }
    }

    pub fn dim(&self) -> usize {
        self.loc.len()
    }

    pub fn nu(&self) -> Nu {
        self.nu
    }

    /// The scale matrix $\Sigma$ (not the covariance, see [`Self::covariance`]).
    pub fn scale(&self) -> &Array2<f64> {
        &self.scale
    }

    /// Lower triangular $L$ with $L L^\top = \Sigma$.
    pub fn lower_factor(&self) -> &Array2<f64> {
        self.chol.lower()
    }

    pub fn mean(&self) -> Array1<f64> {
        self.loc.clone()
    }

    /// Writes the mean into `dst`, which must have length [`Self::dim`].
    pub fn mean_into<'a>(&self, dst: &'a mut Array1<f64>) -> &'a mut Array1<f64> {
        assert_eq!(dst.len(), self.dim(), "studentst: input length mismatch");
        dst.assign(&self.loc);
        dst
    }

    /// Covariance $\frac{\nu}{\nu-2}\Sigma$, or $\Sigma$ in the Gaussian limit.
    ///
    /// The covariance only exists for $\nu > 2$; construction rejects any
    /// smaller finite `nu`, so it is defined for every `StudentsT`.
    pub fn covariance(&self) -> Array2<f64> {
        match self.nu {
            Nu::Finite(nu) => &self.scale * (nu / (nu - 2.)),
            Nu::GaussianLimit => self.scale.clone(),
        }
    }

    /// Writes the covariance into `dst`, which must be `dim` square.
    pub fn covariance_into<'a>(&self, dst: &'a mut Array2<f64>) -> &'a mut Array2<f64> {
        assert_eq!(
            dst.shape(),
            self.scale.shape(),
            "studentst: input matrix size mismatch"
        );
        dst.assign(&self.scale);
        if let Nu::Finite(nu) = self.nu {
            *dst *= nu / (nu - 2.);
        }
        dst
    }

    /// Log of the density at `y`.
    pub fn log_prob(&self, y: ArrayView1<f64>) -> f64 {
        assert_eq!(y.len(), self.dim(), "studentst: input length mismatch");
        let n = self.dim() as f64;
        let mahal = self.chol.mahalanobis_sq((&y - &self.loc).view());
        match self.nu {
            Nu::Finite(nu) => {
                let t1 = ln_gamma_ratio(nu / 2., n / 2.)
                    - n / 2. * (nu * f64::PI()).ln()
                    - self.ln_sqrt_det;
                t1 - ((nu + n) / 2.) * (mahal / nu).ln_1p()
            }
            Nu::GaussianLimit => -n / 2. * f64::TAU().ln() - self.ln_sqrt_det - 0.5 * mahal,
        }
    }

    /// Density at `y`.
    pub fn prob(&self, y: ArrayView1<f64>) -> f64 {
        self.log_prob(y).exp()
    }

    /// Draws a sample into `dst`, which must have length [`Self::dim`].
    pub fn sample_into<'a, R: Rng + ?Sized>(
        &self,
        dst: &'a mut Array1<f64>,
        rng: &mut R,
    ) -> &'a mut Array1<f64> {
        assert_eq!(dst.len(), self.dim(), "studentst: input length mismatch");
        // If Y ~ N(0, Σ) and U ~ χ²(ν) then μ + Y·sqrt(ν/U) follows this
        // distribution.
        let z = Array1::random_using(self.dim(), StandardNormal, rng);
        let y = self.chol.lower().dot(&z);
        let factor = match &self.mixing {
            Some(chi) => (self.nu.value() / chi.sample(rng)).sqrt(),
            None => 1.,
        };
        Zip::from(&mut *dst)
            .and(&self.loc)
            .and(&y)
            .for_each(|d, &mu, &y| *d = mu + y * factor);
        dst
    }

    /// Distribution of the unobserved coordinates given `values` at the
    /// `observed` coordinates.
    ///
    /// The result has dimension `dim - observed.len()` and keeps the relative
    /// order of the remaining coordinates: observing coordinate 1 of a
    /// 3-dimensional distribution leaves coordinates {0, 2}. A finite `nu`
    /// grows by `observed.len()`.
    ///
    /// Fails if the observed block of the scale matrix, or the updated scale
    /// matrix, cannot be factorized. This is impossible in exact arithmetic but
    /// happens with finite precision.
    ///
    /// # Panics
    ///
    /// If `observed` is empty or covers every coordinate, if it repeats an
    /// index or holds one out of range, if `values` has a different length, or
    /// if any of `values` is NaN or infinite.
    pub fn condition(
        &self,
        observed: &[usize],
        values: ArrayView1<f64>,
    ) -> Result<StudentsT, FactorizationError> {
        assert!(!observed.is_empty(), "studentst: no observed value");
        assert_eq!(
            observed.len(),
            values.len(),
            "studentst: input length mismatch"
        );
        assert!(
            values.iter().all(|v| v.is_finite()),
            "studentst: observed values must be finite"
        );
        let (nu, loc, scale) =
            conditional_params(observed, values, self.nu, &self.loc, &self.scale)?;
        trace!(
            "conditioned on {} of {} coordinates, nu = {:?}",
            observed.len(),
            self.dim(),
            nu
        );
        StudentsT::new(loc, scale, nu)
    }

    /// Marginal distribution of the coordinates `vars`, in that order.
    ///
    /// Fails only if finite precision breaks the factorization of the
    /// selected block.
    ///
    /// # Panics
    ///
    /// If `vars` is empty, repeats an index or holds one out of range.
    pub fn marginal(&self, vars: &[usize]) -> Result<StudentsT, FactorizationError> {
        assert!(!vars.is_empty(), "studentst: zero dimension");
        util::index_set(vars, self.dim());
        let loc = self.loc.select(Axis(0), vars);
        let scale = util::select_block(&self.scale, vars, vars);
        StudentsT::new(loc, scale, self.nu)
    }

    /// Univariate marginal of coordinate `i`: location $\mu_i$, scale
    /// $\sqrt{\Sigma_{ii}}$ and the same degrees of freedom.
    pub fn marginal_single(&self, i: usize) -> statrs::distribution::StudentsT {
        assert!(
            i < self.dim(),
            "studentst: index {} out of bounds for dimension {}",
            i,
            self.dim()
        );
        statrs::distribution::StudentsT::new(
            self.loc[i],
            self.scale[[i, i]].sqrt(),
            self.nu.value(),
        )
        .expect("diagonal of a positive definite scale is positive")
    }
}

impl Distribution<Array1<f64>> for StudentsT {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Array1<f64> {
        let mut out = Array1::zeros(self.dim());
        self.sample_into(&mut out, rng);
        out
    }
}
