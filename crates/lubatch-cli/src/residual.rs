use lubatch_core::Scalar;
use nalgebra::{ComplexField, DMatrix};

fn frobenius<T: Scalar + ComplexField>(a: &DMatrix<T>) -> f64 {
    a.iter().map(|v| v.modulus_f64().powi(2)).sum::<f64>().sqrt()
}

/// Relative reconstruction error `||P*A - L*U||_F / ||A||_F` of one factored
/// matrix. `ipiv` is `None` for the no-pivoting variants.
pub fn relative_residual<T: Scalar + ComplexField>(
    original: &[T],
    factored: &[T],
    ipiv: Option<&[i32]>,
    m: usize,
    n: usize,
    lda: usize,
) -> f64 {
    let k = m.min(n);
    let mut pa = DMatrix::from_fn(m, n, |i, j| original[i + j * lda]);
    for (j, &p) in ipiv.unwrap_or(&[]).iter().enumerate() {
        pa.swap_rows(j, (p - 1) as usize);
    }

    let l = DMatrix::from_fn(m, k, |i, j| match i.cmp(&j) {
        std::cmp::Ordering::Greater => factored[i + j * lda],
        std::cmp::Ordering::Equal => T::one(),
        std::cmp::Ordering::Less => T::zero(),
    });
    let u = DMatrix::from_fn(k, n, |i, j| {
        if i <= j {
            factored[i + j * lda]
        } else {
            T::zero()
        }
    });

    let norm = frobenius(&pa);
    if norm == 0.0 {
        return 0.0;
    }
    frobenius(&(pa - l * u)) / norm
}
