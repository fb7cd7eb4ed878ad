//! Correlated randomness generated by the dealer.
//!
//! Each query consumes one `QueryRandomness` bundle per party: additive
//! shares of a random index alpha and its one-hot vector, plus three
//! multiplication triples. For every triple kind, the two parties' shares
//! satisfy the cross-term identity
//!
//! `x0 * y1 + x1 * y0 = gamma0 + gamma1`
//!
//! where `*` is the column-wise dot product (table triple), the dot product
//! (inner triple) or the elementwise product (scalar triple). Bundles are
//! single-use; the dealer generates fresh ones for every query and never
//! reuses them.

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    messages::SessionHeader,
    ring, shares,
    ProtocolError,
};

/// Triple for the column-wise matrix multiplication that removes the
/// item-table mask. `x` and `y` are n-by-k, `gamma` has one entry per column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableTriple {
    pub x: Array2<u32>,
    pub y: Array2<u32>,
    pub gamma: Array1<u32>,
}

/// Triple for the feature-vector dot product.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DotTriple {
    pub x: Array1<u32>,
    pub y: Array1<u32>,
    pub gamma: u32,
}

/// Triple for the elementwise scalar-vector product.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalarTriple {
    pub x: Array1<u32>,
    pub y: Array1<u32>,
    pub gamma: Array1<u32>,
}

/// One party's correlated randomness for a single query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRandomness {
    /// Additive share of the dealer's random index alpha.
    pub alpha_share: u32,
    /// Additive share of the one-hot vector at alpha (length n).
    pub e_alpha: Array1<u32>,
    pub table: TableTriple,
    pub inner: DotTriple,
    pub scalar: ScalarTriple,
}

impl QueryRandomness {
    /// Check every component against the session dimensions. A bundle that
    /// disagrees with the header is a fatal protocol error.
    pub fn validate(&self, header: &SessionHeader) -> Result<(), ProtocolError> {
        let n = header.items;
        let k = header.features;
        let expect_vec = |len: usize, want: usize| -> Result<(), ProtocolError> {
            if len != want {
                return Err(ProtocolError::DimensionMismatch {
                    left: vec![len],
                    right: vec![want],
                });
            }
            Ok(())
        };
        let expect_mat = |shape: &[usize]| -> Result<(), ProtocolError> {
            if shape != [n, k] {
                return Err(ProtocolError::DimensionMismatch {
                    left: shape.to_vec(),
                    right: vec![n, k],
                });
            }
            Ok(())
        };
        expect_vec(self.e_alpha.len(), n)?;
        expect_mat(self.table.x.shape())?;
        expect_mat(self.table.y.shape())?;
        expect_vec(self.table.gamma.len(), k)?;
        expect_vec(self.inner.x.len(), k)?;
        expect_vec(self.inner.y.len(), k)?;
        expect_vec(self.scalar.x.len(), k)?;
        expect_vec(self.scalar.y.len(), k)?;
        expect_vec(self.scalar.gamma.len(), k)?;
        Ok(())
    }
}

/// Generate the pair of bundles for one query.
pub fn generate_query(
    rng: &mut impl Rng,
    items: usize,
    features: usize,
) -> Result<(QueryRandomness, QueryRandomness), ProtocolError> {
    let alpha = rng.gen_range(0..items as u32);
    let (alpha0, alpha1) = shares::share_scalar(rng, alpha);
    let (e0, e1) = shares::share_one_hot(rng, items, alpha as usize)?;

    // Table triple: cross terms under the column-wise dot product.
    let x0 = shares::random_mat(rng, items, features);
    let x1 = shares::random_mat(rng, items, features);
    let y0 = shares::random_mat(rng, items, features);
    let y1 = shares::random_mat(rng, items, features);
    let cross = ring::vec_add(
        ring::colwise_dot(x0.view(), y1.view())?.view(),
        ring::colwise_dot(x1.view(), y0.view())?.view(),
    )?;
    let (g0, g1) = shares::share_vec(rng, cross.view());
    let table0 = TableTriple {
        x: x0,
        y: y0,
        gamma: g0,
    };
    let table1 = TableTriple {
        x: x1,
        y: y1,
        gamma: g1,
    };

    // Inner-product triple: cross terms under the plain dot product.
    let x0 = shares::random_vec(rng, features);
    let x1 = shares::random_vec(rng, features);
    let y0 = shares::random_vec(rng, features);
    let y1 = shares::random_vec(rng, features);
    let cross = ring::dot(x0.view(), y1.view())?.wrapping_add(ring::dot(x1.view(), y0.view())?);
    let (g0, g1) = shares::share_scalar(rng, cross);
    let inner0 = DotTriple {
        x: x0,
        y: y0,
        gamma: g0,
    };
    let inner1 = DotTriple {
        x: x1,
        y: y1,
        gamma: g1,
    };

    // Scalar triple: cross terms elementwise.
    let x0 = shares::random_vec(rng, features);
    let x1 = shares::random_vec(rng, features);
    let y0 = shares::random_vec(rng, features);
    let y1 = shares::random_vec(rng, features);
    let cross = ring::vec_add(
        ring::mul_elem(x0.view(), y1.view())?.view(),
        ring::mul_elem(x1.view(), y0.view())?.view(),
    )?;
    let (g0, g1) = shares::share_vec(rng, cross.view());
    let scalar0 = ScalarTriple {
        x: x0,
        y: y0,
        gamma: g0,
    };
    let scalar1 = ScalarTriple {
        x: x1,
        y: y1,
        gamma: g1,
    };

    Ok((
        QueryRandomness {
            alpha_share: alpha0,
            e_alpha: e0,
            table: table0,
            inner: inner0,
            scalar: scalar0,
        },
        QueryRandomness {
            alpha_share: alpha1,
            e_alpha: e1,
            table: table1,
            inner: inner1,
            scalar: scalar1,
        },
    ))
}

/// Generate bundles for every query of a session up front. Generating the
/// whole batch before anything is sent fixes the query ordering and keeps
/// replay runs deterministic under a seeded generator.
pub fn generate_batch(
    rng: &mut impl Rng,
    header: &SessionHeader,
) -> Result<Vec<(QueryRandomness, QueryRandomness)>, ProtocolError> {
    (0..header.queries)
        .map(|_| generate_query(rng, header.items, header.features))
        .collect()
}
