//! Secure multiplication under additive sharing.
//!
//! All three protocols follow the same Du-Atallah pattern. Party p holds
//! operand shares `(x_p, y_p)` and a triple `(a_p, b_p, gamma_p)` whose
//! cross terms satisfy `a0*b1 + a1*b0 = gamma0 + gamma1`. It masks both
//! operands, trades the masked pair with the peer in a single exchange, and
//! outputs
//!
//! `z_p = x_p * (y_p + y'_q) - b_p * x'_q + gamma_p`
//!
//! where `x'_q, y'_q` are the peer's masked operands and `*` is the dot
//! product, the elementwise product or the column-wise dot product. The two
//! output shares sum to `x * y` over the reconstructed operands; the mask
//! cross terms cancel against gamma. Triples are single-use, and nothing
//! here verifies them: a malformed triple yields a wrong share, not an
//! error.

use futures::{Sink, Stream};
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{
    messages::PeerMessage,
    randomness::{DotTriple, ScalarTriple, TableTriple},
    ring,
    transport::Link,
    ProtocolError,
};

/// Share of the dot product of two shared k-vectors.
pub async fn secure_dot<E, C>(
    peer: &mut Link<PeerMessage, C>,
    x: ArrayView1<'_, u32>,
    y: ArrayView1<'_, u32>,
    triple: &DotTriple,
) -> Result<u32, ProtocolError>
where
    C: Stream<Item = Result<PeerMessage, E>> + Sink<PeerMessage> + Unpin,
{
    let x_masked = ring::vec_add(x, triple.x.view())?;
    let y_masked = ring::vec_add(y, triple.y.view())?;
    let reply = peer
        .exchange(PeerMessage::MaskedVectorPair {
            x: x_masked,
            y: y_masked,
        })
        .await?;
    let (x_peer, y_peer) = match reply {
        PeerMessage::MaskedVectorPair { x, y } => (x, y),
        _ => {
            return Err(ProtocolError::UnexpectedMessage {
                step: "secure dot product",
            })
        }
    };

    let lifted = ring::vec_add(y, y_peer.view())?;
    let z = ring::dot(x, lifted.view())?
        .wrapping_sub(ring::dot(triple.y.view(), x_peer.view())?)
        .wrapping_add(triple.gamma);
    Ok(z)
}

/// Share of the elementwise product of a shared k-vector with a shared
/// broadcast scalar. `y` is the scalar share replicated across positions.
pub async fn secure_scalar<E, C>(
    peer: &mut Link<PeerMessage, C>,
    x: ArrayView1<'_, u32>,
    y: ArrayView1<'_, u32>,
    triple: &ScalarTriple,
) -> Result<Array1<u32>, ProtocolError>
where
    C: Stream<Item = Result<PeerMessage, E>> + Sink<PeerMessage> + Unpin,
{
    let x_masked = ring::vec_add(x, triple.x.view())?;
    let y_masked = ring::vec_add(y, triple.y.view())?;
    let reply = peer
        .exchange(PeerMessage::MaskedVectorPair {
            x: x_masked,
            y: y_masked,
        })
        .await?;
    let (x_peer, y_peer) = match reply {
        PeerMessage::MaskedVectorPair { x, y } => (x, y),
        _ => {
            return Err(ProtocolError::UnexpectedMessage {
                step: "secure scalar product",
            })
        }
    };

    let lifted = ring::vec_add(y, y_peer.view())?;
    let products = ring::mul_elem(x, lifted.view())?;
    let correction = ring::mul_elem(triple.y.view(), x_peer.view())?;
    ring::vec_add(
        ring::vec_sub(products.view(), correction.view())?.view(),
        triple.gamma.view(),
    )
}

/// Share of the column-wise dot product of two shared n-by-k matrices.
/// Used to select the masked-table row: the x operand is a one-hot share
/// broadcast across columns, the y operand the local mask matrix.
pub async fn secure_select<E, C>(
    peer: &mut Link<PeerMessage, C>,
    x: ArrayView2<'_, u32>,
    y: ArrayView2<'_, u32>,
    triple: &TableTriple,
) -> Result<Array1<u32>, ProtocolError>
where
    C: Stream<Item = Result<PeerMessage, E>> + Sink<PeerMessage> + Unpin,
{
    let x_masked = ring::mat_add(x, triple.x.view())?;
    let y_masked = ring::mat_add(y, triple.y.view())?;
    let reply = peer
        .exchange(PeerMessage::MaskedMatrixPair {
            x: x_masked,
            y: y_masked,
        })
        .await?;
    let (x_peer, y_peer) = match reply {
        PeerMessage::MaskedMatrixPair { x, y } => (x, y),
        _ => {
            return Err(ProtocolError::UnexpectedMessage {
                step: "secure table select",
            })
        }
    };

    let lifted = ring::mat_add(y, y_peer.view())?;
    let products = ring::colwise_dot(x, lifted.view())?;
    let correction = ring::colwise_dot(triple.y.view(), x_peer.view())?;
    ring::vec_add(
        ring::vec_sub(products.view(), correction.view())?.view(),
        triple.gamma.view(),
    )
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use crate::{shares, transport::link_pair};

    use super::*;

    /// Hand-build a dot triple pair satisfying the cross-term identity.
    fn dot_triple_pair(rng: &mut impl Rng, a: &Array1<u32>, b: &Array1<u32>) -> (DotTriple, DotTriple) {
        let (a0, a1) = shares::share_vec(rng, a.view());
        let (b0, b1) = shares::share_vec(rng, b.view());
        let cross = ring::dot(a0.view(), b1.view())
            .unwrap()
            .wrapping_add(ring::dot(a1.view(), b0.view()).unwrap());
        let (g0, g1) = shares::share_scalar(rng, cross);
        (
            DotTriple { x: a0, y: b0, gamma: g0 },
            DotTriple { x: a1, y: b1, gamma: g1 },
        )
    }

    #[tokio::test]
    async fn dot_shares_sum_to_true_product() {
        // x = [3, -2], y = [1, 4], dot = -5. Triple masks u = [10, 20], v = [5, 6].
        let mut rng = SmallRng::from_seed([41; 32]);
        let x = array![3u32, (-2i32) as u32];
        let y = array![1u32, 4];
        let (x0, x1) = shares::share_vec(&mut rng, x.view());
        let (y0, y1) = shares::share_vec(&mut rng, y.view());
        let (t0, t1) = dot_triple_pair(&mut rng, &array![10u32, 20], &array![5u32, 6]);

        let (mut link0, mut link1) = link_pair(0, 1, 1 << 16);
        let (z0, z1) = futures::join!(
            secure_dot(&mut link0, x0.view(), y0.view(), &t0),
            secure_dot(&mut link1, x1.view(), y1.view(), &t1),
        );
        let total = z0.unwrap().wrapping_add(z1.unwrap());
        assert_eq!(total, (-5i32) as u32);
    }

    #[tokio::test]
    async fn dot_random_inputs() {
        let mut rng = SmallRng::from_seed([42; 32]);
        for _ in 0..8 {
            let x = shares::random_vec(&mut rng, 6);
            let y = shares::random_vec(&mut rng, 6);
            let (x0, x1) = shares::share_vec(&mut rng, x.view());
            let (y0, y1) = shares::share_vec(&mut rng, y.view());
            let mask_a = shares::random_vec(&mut rng, 6);
            let mask_b = shares::random_vec(&mut rng, 6);
            let (t0, t1) = dot_triple_pair(&mut rng, &mask_a, &mask_b);

            let (mut link0, mut link1) = link_pair(0, 1, 1 << 16);
            let (z0, z1) = futures::join!(
                secure_dot(&mut link0, x0.view(), y0.view(), &t0),
                secure_dot(&mut link1, x1.view(), y1.view(), &t1),
            );
            let expected = ring::dot(x.view(), y.view()).unwrap();
            assert_eq!(z0.unwrap().wrapping_add(z1.unwrap()), expected);
        }
    }

    #[tokio::test]
    async fn scalar_shares_sum_to_elementwise_product() {
        let mut rng = SmallRng::from_seed([43; 32]);
        let x = array![7u32, (-3i32) as u32, 1000];
        let delta = 5u32;
        let y = Array1::from_elem(3, delta);
        let (x0, x1) = shares::share_vec(&mut rng, x.view());
        let (y0, y1) = shares::share_vec(&mut rng, y.view());

        let a = shares::random_vec(&mut rng, 3);
        let b = shares::random_vec(&mut rng, 3);
        let (a0, a1) = shares::share_vec(&mut rng, a.view());
        let (b0, b1) = shares::share_vec(&mut rng, b.view());
        let cross = ring::vec_add(
            ring::mul_elem(a0.view(), b1.view()).unwrap().view(),
            ring::mul_elem(a1.view(), b0.view()).unwrap().view(),
        )
        .unwrap();
        let (g0, g1) = shares::share_vec(&mut rng, cross.view());
        let t0 = ScalarTriple { x: a0, y: b0, gamma: g0 };
        let t1 = ScalarTriple { x: a1, y: b1, gamma: g1 };

        let (mut link0, mut link1) = link_pair(0, 1, 1 << 16);
        let (z0, z1) = futures::join!(
            secure_scalar(&mut link0, x0.view(), y0.view(), &t0),
            secure_scalar(&mut link1, x1.view(), y1.view(), &t1),
        );
        let combined = ring::vec_add(z0.unwrap().view(), z1.unwrap().view()).unwrap();
        let expected = ring::mul_elem(x.view(), y.view()).unwrap();
        assert_eq!(combined, expected);
    }

    #[tokio::test]
    async fn select_shares_sum_to_columnwise_product() {
        let mut rng = SmallRng::from_seed([44; 32]);
        let rows = 4;
        let cols = 3;
        let x = shares::random_mat(&mut rng, rows, cols);
        let y = shares::random_mat(&mut rng, rows, cols);
        let (x0, x1) = shares::share_mat(&mut rng, x.view());
        let (y0, y1) = shares::share_mat(&mut rng, y.view());

        let a: Array2<u32> = shares::random_mat(&mut rng, rows, cols);
        let b: Array2<u32> = shares::random_mat(&mut rng, rows, cols);
        let (a0, a1) = shares::share_mat(&mut rng, a.view());
        let (b0, b1) = shares::share_mat(&mut rng, b.view());
        let cross = ring::vec_add(
            ring::colwise_dot(a0.view(), b1.view()).unwrap().view(),
            ring::colwise_dot(a1.view(), b0.view()).unwrap().view(),
        )
        .unwrap();
        let (g0, g1) = shares::share_vec(&mut rng, cross.view());
        let t0 = TableTriple { x: a0, y: b0, gamma: g0 };
        let t1 = TableTriple { x: a1, y: b1, gamma: g1 };

        let (mut link0, mut link1) = link_pair(0, 1, 1 << 20);
        let (z0, z1) = futures::join!(
            secure_select(&mut link0, x0.view(), y0.view(), &t0),
            secure_select(&mut link1, x1.view(), y1.view(), &t1),
        );
        let combined = ring::vec_add(z0.unwrap().view(), z1.unwrap().view()).unwrap();
        let expected = ring::colwise_dot(x.view(), y.view()).unwrap();
        assert_eq!(combined, expected);
    }

    #[tokio::test]
    async fn wrong_message_kind_is_rejected() {
        let mut rng = SmallRng::from_seed([45; 32]);
        let x = shares::random_vec(&mut rng, 2);
        let (t0, _) = dot_triple_pair(&mut rng, &array![1u32, 2], &array![3u32, 4]);

        let (mut link0, mut link1) = link_pair(0, 1, 1 << 16);
        let wrong_peer = async {
            // Answer the exchange with an alignment diff instead of operands.
            let _ = link1.exchange(PeerMessage::AlignDiff(0)).await;
        };
        let (result, _) = futures::join!(
            secure_dot(&mut link0, x.view(), x.view(), &t0),
            wrong_peer,
        );
        assert!(matches!(
            result,
            Err(ProtocolError::UnexpectedMessage { .. })
        ));
    }
}
