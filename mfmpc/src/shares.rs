//! Additive secret sharing over Z_2^32.
//!
//! A sharing of `x` is a pair `(s0, s1)` with `s0 + s1 = x` (wrapping).
//! One share is drawn uniformly from the ring, so either share alone is
//! uniformly random and reveals nothing about `x` beyond its shape.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;

use crate::{ring, ProtocolError};

/// Split a scalar into two additive shares.
pub fn share_scalar(rng: &mut impl Rng, value: u32) -> (u32, u32) {
    let s0: u32 = rng.gen();
    (s0, value.wrapping_sub(s0))
}

/// Split a vector into two additive shares.
pub fn share_vec(rng: &mut impl Rng, values: ArrayView1<u32>) -> (Array1<u32>, Array1<u32>) {
    let s0 = random_vec(rng, values.len());
    let s1 = ring::vec_sub(values, s0.view()).expect("shares have the secret's shape");
    (s0, s1)
}

/// Split a matrix into two additive shares.
pub fn share_mat(rng: &mut impl Rng, values: ArrayView2<u32>) -> (Array2<u32>, Array2<u32>) {
    let s0 = random_mat(rng, values.nrows(), values.ncols());
    let s1 = ring::mat_sub(values, s0.view()).expect("shares have the secret's shape");
    (s0, s1)
}

/// Split the one-hot vector at `index` into two additive shares.
pub fn share_one_hot(
    rng: &mut impl Rng,
    len: usize,
    index: usize,
) -> Result<(Array1<u32>, Array1<u32>), ProtocolError> {
    let secret = ring::one_hot(len, index)?;
    Ok(share_vec(rng, secret.view()))
}

/// Uniformly random ring vector.
pub fn random_vec(rng: &mut impl Rng, len: usize) -> Array1<u32> {
    Array1::from_shape_simple_fn(len, || rng.gen())
}

/// Uniformly random ring matrix.
pub fn random_mat(rng: &mut impl Rng, rows: usize, cols: usize) -> Array2<u32> {
    Array2::from_shape_simple_fn((rows, cols), || rng.gen())
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{rngs::SmallRng, SeedableRng};

    use super::*;

    #[test]
    fn scalar_shares_reconstruct() {
        let mut rng = SmallRng::from_seed([7; 32]);
        for value in [0, 1, 42, u32::MAX, (-5i32) as u32] {
            let (s0, s1) = share_scalar(&mut rng, value);
            assert_eq!(s0.wrapping_add(s1), value);
        }
    }

    #[test]
    fn vector_shares_reconstruct() {
        let mut rng = SmallRng::from_seed([8; 32]);
        let secret = array![3u32, 0, u32::MAX, 17];
        let (s0, s1) = share_vec(&mut rng, secret.view());
        assert_eq!(ring::vec_add(s0.view(), s1.view()).unwrap(), secret);
    }

    #[test]
    fn matrix_shares_reconstruct() {
        let mut rng = SmallRng::from_seed([9; 32]);
        let secret = random_mat(&mut rng, 4, 3);
        let (s0, s1) = share_mat(&mut rng, secret.view());
        assert_eq!(ring::mat_add(s0.view(), s1.view()).unwrap(), secret);
    }

    #[test]
    fn one_hot_shares_reconstruct() {
        let mut rng = SmallRng::from_seed([10; 32]);
        let (s0, s1) = share_one_hot(&mut rng, 5, 2).unwrap();
        let combined = ring::vec_add(s0.view(), s1.view()).unwrap();
        assert_eq!(combined, ring::one_hot(5, 2).unwrap());
    }

    #[test]
    fn one_hot_share_rejects_bad_index() {
        let mut rng = SmallRng::from_seed([11; 32]);
        assert!(share_one_hot(&mut rng, 5, 5).is_err());
    }
}
