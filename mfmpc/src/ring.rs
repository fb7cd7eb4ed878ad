//! Arithmetic over the ring Z_2^32.
//!
//! All shares, masks and triple components are `u32` values; addition,
//! subtraction and multiplication wrap. Dot products accumulate in `u64`
//! before truncating back to the ring width, which is exact mod 2^32.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};

use crate::ProtocolError;

fn check_len(a: usize, b: usize) -> Result<(), ProtocolError> {
    if a != b {
        return Err(ProtocolError::DimensionMismatch {
            left: vec![a],
            right: vec![b],
        });
    }
    Ok(())
}

fn check_shape(a: &[usize], b: &[usize]) -> Result<(), ProtocolError> {
    if a != b {
        return Err(ProtocolError::DimensionMismatch {
            left: a.to_vec(),
            right: b.to_vec(),
        });
    }
    Ok(())
}

/// Elementwise vector addition.
pub fn vec_add(a: ArrayView1<u32>, b: ArrayView1<u32>) -> Result<Array1<u32>, ProtocolError> {
    check_len(a.len(), b.len())?;
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| x.wrapping_add(y)))
}

/// Elementwise vector subtraction.
pub fn vec_sub(a: ArrayView1<u32>, b: ArrayView1<u32>) -> Result<Array1<u32>, ProtocolError> {
    check_len(a.len(), b.len())?;
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| x.wrapping_sub(y)))
}

/// Elementwise vector product.
pub fn mul_elem(a: ArrayView1<u32>, b: ArrayView1<u32>) -> Result<Array1<u32>, ProtocolError> {
    check_len(a.len(), b.len())?;
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| x.wrapping_mul(y)))
}

/// Elementwise matrix addition.
pub fn mat_add(a: ArrayView2<u32>, b: ArrayView2<u32>) -> Result<Array2<u32>, ProtocolError> {
    check_shape(a.shape(), b.shape())?;
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| x.wrapping_add(y)))
}

/// Elementwise matrix subtraction.
pub fn mat_sub(a: ArrayView2<u32>, b: ArrayView2<u32>) -> Result<Array2<u32>, ProtocolError> {
    check_shape(a.shape(), b.shape())?;
    Ok(Zip::from(a).and(b).map_collect(|&x, &y| x.wrapping_sub(y)))
}

/// Dot product of two vectors.
pub fn dot(a: ArrayView1<u32>, b: ArrayView1<u32>) -> Result<u32, ProtocolError> {
    check_len(a.len(), b.len())?;
    let sum = a.iter().zip(b.iter()).fold(0u64, |acc, (&x, &y)| {
        acc.wrapping_add((x as u64).wrapping_mul(y as u64))
    });
    Ok(sum as u32)
}

/// Column-wise dot product of two equal-shaped matrices.
/// Returns one dot product per column.
pub fn colwise_dot(a: ArrayView2<u32>, b: ArrayView2<u32>) -> Result<Array1<u32>, ProtocolError> {
    check_shape(a.shape(), b.shape())?;
    let mut out = Array1::zeros(a.ncols());
    for (c, slot) in out.iter_mut().enumerate() {
        *slot = dot(a.column(c), b.column(c))?;
    }
    Ok(out)
}

/// Weighted row selection: `out[c] = sum_r e[r] * m[r][c]`.
/// With a one-hot `e` this picks out one row of `m`.
pub fn select_row(e: ArrayView1<u32>, m: ArrayView2<u32>) -> Result<Array1<u32>, ProtocolError> {
    check_len(e.len(), m.nrows())?;
    let mut out = Array1::zeros(m.ncols());
    for (c, slot) in out.iter_mut().enumerate() {
        *slot = dot(e, m.column(c))?;
    }
    Ok(out)
}

/// Replicate a vector across `cols` columns.
pub fn broadcast_cols(v: ArrayView1<u32>, cols: usize) -> Array2<u32> {
    let mut out = Array2::zeros((v.len(), cols));
    for (r, &x) in v.iter().enumerate() {
        out.row_mut(r).fill(x);
    }
    out
}

/// Cyclic rotation by a signed shift, normalized into `[0, len)`.
/// Element `i` moves to position `(i + shift) mod len`.
pub fn rotate(v: ArrayView1<u32>, shift: i64) -> Array1<u32> {
    let n = v.len();
    if n == 0 {
        return Array1::zeros(0);
    }
    let shift = shift.rem_euclid(n as i64) as usize;
    let mut out = Array1::zeros(n);
    for (i, &x) in v.iter().enumerate() {
        out[(i + shift) % n] = x;
    }
    out
}

/// Standard basis vector of length `len` with a one at `index`.
pub fn one_hot(len: usize, index: usize) -> Result<Array1<u32>, ProtocolError> {
    if index >= len {
        return Err(ProtocolError::OutOfRange { index, len });
    }
    let mut out = Array1::zeros(len);
    out[index] = 1;
    Ok(out)
}
