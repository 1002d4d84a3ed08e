use ndarray::{Array1, Array2, Axis};
use ndarray_stats::CorrelationExt;
use proptest::collection::vec;
use proptest::prelude::*;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use studentst::{FactorizationError, Nu, StudentsT};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Σ = A·Aᵀ + n·I is comfortably positive definite.
fn spd(n: usize, entries: &[f64]) -> Array2<f64> {
    let a = Array2::from_shape_vec((n, n), entries.to_vec()).unwrap();
    a.dot(&a.t()) + Array2::<f64>::eye(n) * n as f64
}

fn params() -> impl Strategy<Value = (Array1<f64>, Array2<f64>, Array1<f64>)> {
    (1usize..6).prop_flat_map(|n| {
        (
            vec(-3.0f64..3.0, n),
            vec(-1.0f64..1.0, n * n),
            vec(-4.0f64..4.0, n),
        )
            .prop_map(move |(loc, entries, y)| (Array1::from(loc), spd(n, &entries), Array1::from(y)))
    })
}

proptest! {
    #[test]
    fn prob_is_exp_log_prob((loc, scale, y) in params(), nu in 2.1f64..50.) {
        let dist = StudentsT::new(loc, scale, Nu::Finite(nu)).unwrap();
        let lp = dist.log_prob(y.view());
        prop_assert!(lp.is_finite());
        prop_assert_eq!(dist.prob(y.view()), lp.exp());
    }

    #[test]
    fn large_nu_approaches_gaussian((loc, scale, y) in params()) {
        let t = StudentsT::new(loc.clone(), scale.clone(), Nu::Finite(1e8)).unwrap();
        let gauss = StudentsT::new(loc, scale, Nu::GaussianLimit).unwrap();
        let diff = (t.log_prob(y.view()) - gauss.log_prob(y.view())).abs();
        prop_assert!(diff < 1e-4, "difference {}", diff);
    }

    #[test]
    fn marginal_of_everything_is_identity((loc, scale, _y) in params(), nu in 2.1f64..50.) {
        let dist = StudentsT::new(loc, scale, Nu::Finite(nu)).unwrap();
        let all: Vec<usize> = (0..dist.dim()).collect();
        let marginal = dist.marginal(&all).unwrap();
        prop_assert_eq!(marginal.params(), dist.params());
    }

    #[test]
    fn condition_adds_observed_count(
        (loc, scale, y) in params(),
        mask in vec(any::<bool>(), 5),
        nu in 2.1f64..50.,
    ) {
        let n = loc.len();
        let observed: Vec<usize> = (0..n).filter(|&i| mask[i]).collect();
        prop_assume!(!observed.is_empty() && observed.len() < n);

        let dist = StudentsT::new(loc, scale, Nu::Finite(nu)).unwrap();
        let values = y.select(Axis(0), &observed);
        let cond = dist.condition(&observed, values.view()).unwrap();
        prop_assert_eq!(cond.nu(), Nu::Finite(nu + observed.len() as f64));
        prop_assert_eq!(cond.dim(), n - observed.len());
        prop_assert_eq!(cond.scale(), &cond.scale().t());
    }

    #[test]
    fn covariance_of_identity_scale(n in 1usize..8) {
        let dist = StudentsT::new(Array1::zeros(n), Array2::eye(n), Nu::Finite(4.)).unwrap();
        prop_assert_eq!(dist.covariance(), Array2::<f64>::eye(n) * 2.);
    }
}

#[test]
fn conditioning_matches_gaussian_closed_form() {
    // For ν = ∞ the conditional of a bivariate normal is
    // N(μ₁ + ρσ₁/σ₂ (x₂ - μ₂), σ₁²(1 - ρ²)).
    init_logger();
    let (s1, s2, rho) = (2f64, 0.5f64, 0.6f64);
    let scale = ndarray::arr2(&[[s1 * s1, rho * s1 * s2], [rho * s1 * s2, s2 * s2]]);
    let dist = StudentsT::new(ndarray::arr1(&[1., -1.]), scale, Nu::GaussianLimit).unwrap();
    let cond = dist.condition(&[1], ndarray::arr1(&[0.]).view()).unwrap();
    let mean = 1. + rho * s1 / s2 * (0. - -1.);
    let var = s1 * s1 * (1. - rho * rho);
    assert!((cond.mean()[0] - mean).abs() < 1e-12);
    assert!((cond.scale()[[0, 0]] - var).abs() < 1e-12);
    assert_eq!(cond.nu(), Nu::GaussianLimit);
}

#[test]
fn singular_scale_is_a_factorization_failure() {
    init_logger();
    let scale = ndarray::arr2(&[[1., 2.], [2., 4.]]);
    let err = StudentsT::new(Array1::zeros(2), scale, Nu::Finite(3.)).unwrap_err();
    assert!(matches!(
        err,
        FactorizationError::NotPositiveDefinite { pivot: 1, .. }
    ));
}

#[test]
fn sample_moments() {
    init_logger();
    let loc = ndarray::arr1(&[1., -2.]);
    let scale = ndarray::arr2(&[[2., 0.6], [0.6, 1.]]);
    let dist = StudentsT::new(loc.clone(), scale.clone(), Nu::Finite(8.)).unwrap();
    let mut rng = StdRng::seed_from_u64(1234);

    let n_samples = 40_000;
    let mut samples = Array2::zeros((2, n_samples));
    for mut column in samples.columns_mut() {
        column.assign(&dist.sample(&mut rng));
    }

    let mean = samples.mean_axis(Axis(1)).unwrap();
    assert!((&mean - &loc).mapv(f64::abs).iter().all(|&d| d < 0.05), "mean {}", mean);

    // ν/(ν-2) = 4/3
    let cov = samples.cov(1.).unwrap();
    let expected = dist.covariance();
    assert!((&cov - &expected).mapv(f64::abs).iter().all(|&d| d < 0.15), "cov {}", cov);
    assert!((&expected - &(scale * (4. / 3.))).mapv(f64::abs).sum() < 1e-12);
}

#[test]
fn concurrent_readers() {
    let dist = StudentsT::new(
        ndarray::arr1(&[0., 1., 2.]),
        Array2::<f64>::eye(3) * 2.,
        Nu::Finite(5.),
    )
    .unwrap();
    let expected = dist.log_prob(ndarray::arr1(&[0.5, 0.5, 0.5]).view());
    std::thread::scope(|scope| {
        for seed in 0..4 {
            let dist = &dist;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..100 {
                    let y = dist.sample(&mut rng);
                    assert!(dist.log_prob(y.view()).is_finite());
                }
                assert_eq!(
                    dist.log_prob(ndarray::arr1(&[0.5, 0.5, 0.5]).view()),
                    expected
                );
            });
        }
    });
}
