use ndarray::{Array2, Axis};
use std::collections::BTreeSet;

/// Collects `indices` into a set, panicking on a repeated or out of range index.
pub fn index_set(indices: &[usize], dim: usize) -> BTreeSet<usize> {
    let mut set = BTreeSet::new();
    for &i in indices {
        assert!(
            i < dim,
            "studentst: index {} out of bounds for dimension {}",
            i,
            dim
        );
        assert!(set.insert(i), "studentst: index {} repeated", i);
    }
    set
}

/// Complement of `observed` in `0..dim`, in ascending order.
pub fn find_unobserved(observed: &[usize], dim: usize) -> Vec<usize> {
    let observed = index_set(observed, dim);
    let all: BTreeSet<usize> = (0..dim).collect();
    all.difference(&observed).copied().collect()
}

/// `matrix[rows, cols]`, keeping the order of both index lists.
pub fn select_block(matrix: &Array2<f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    matrix.select(Axis(0), rows).select(Axis(1), cols)
}

/// Overwrites the strict upper triangle with the transpose of the lower one.
pub fn mirror_lower(matrix: &mut Array2<f64>) {
    let n = matrix.nrows();
    for i in 0..n {
        for j in i + 1..n {
            matrix[[i, j]] = matrix[[j, i]];
        }
    }
}

#[cfg(test)]
pub(crate) fn assert_all_close<D: ndarray::Dimension>(
    actual: &ndarray::Array<f64, D>,
    expected: &ndarray::Array<f64, D>,
    tol: f64,
) {
    assert_eq!(actual.shape(), expected.shape());
    ndarray::Zip::from(actual).and(expected).for_each(|&a, &e| {
        assert!(
            (a - e).abs() <= tol,
            "expected {}, got {} (tolerance {})\nexpected: {}\nactual: {}",
            e,
            a,
            tol,
            expected,
            actual
        );
    });
}
