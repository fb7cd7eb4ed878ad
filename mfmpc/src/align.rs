//! Oblivious index alignment.
//!
//! The dealer hands each party a share of a one-hot vector at a random index
//! alpha. This sub-protocol turns it into a share of the one-hot vector at
//! the secret target index j without revealing either index: each party
//! publishes `item_share - alpha_share`, and the sum of the two differences
//! is `j - alpha` in the ring. That rotation amount is the only value both
//! parties learn, and it is uniform from either party's point of view since
//! alpha stays secret.

use futures::{Sink, Stream};
use ndarray::{Array1, ArrayView1};

use crate::{
    messages::PeerMessage,
    ring,
    transport::Link,
    ProtocolError,
};

/// Rotate our share of the one-hot vector at alpha to the secret index j.
/// Costs one scalar exchange with the peer.
pub async fn align_one_hot<E, C>(
    peer: &mut Link<PeerMessage, C>,
    item_share: u32,
    alpha_share: u32,
    e_alpha: ArrayView1<'_, u32>,
) -> Result<Array1<u32>, ProtocolError>
where
    C: Stream<Item = Result<PeerMessage, E>> + Sink<PeerMessage> + Unpin,
{
    let local_diff = item_share.wrapping_sub(alpha_share);
    let reply = peer.exchange(PeerMessage::AlignDiff(local_diff)).await?;
    let peer_diff = match reply {
        PeerMessage::AlignDiff(diff) => diff,
        _ => {
            return Err(ProtocolError::UnexpectedMessage {
                step: "index alignment",
            })
        }
    };

    // The wrapped sum is (j - alpha) mod 2^32; both indices are below n,
    // so reinterpreting as signed recovers the exact difference.
    let shift = local_diff.wrapping_add(peer_diff) as i32;
    Ok(ring::rotate(e_alpha, shift as i64))
}

#[cfg(test)]
mod tests {
    use rand::{rngs::SmallRng, SeedableRng};

    use crate::{shares, transport::link_pair};

    use super::*;

    async fn align_both(n: usize, alpha: usize, j: usize) -> (Array1<u32>, Array1<u32>) {
        let mut rng = SmallRng::from_seed([31; 32]);
        let (alpha0, alpha1) = shares::share_scalar(&mut rng, alpha as u32);
        let (e0, e1) = shares::share_one_hot(&mut rng, n, alpha).unwrap();
        let (j0, j1) = shares::share_scalar(&mut rng, j as u32);

        let (mut link0, mut link1) = link_pair(0, 1, 1 << 16);
        let (r0, r1) = futures::join!(
            align_one_hot(&mut link0, j0, alpha0, e0.view()),
            align_one_hot(&mut link1, j1, alpha1, e1.view()),
        );
        (r0.unwrap(), r1.unwrap())
    }

    #[tokio::test]
    async fn aligned_shares_sum_to_target_one_hot() {
        for (n, alpha, j) in [(4, 1, 3), (4, 3, 1), (7, 0, 6), (5, 2, 2)] {
            let (r0, r1) = align_both(n, alpha, j).await;
            let combined = ring::vec_add(r0.view(), r1.view()).unwrap();
            assert_eq!(combined, ring::one_hot(n, j).unwrap(), "n={} alpha={} j={}", n, alpha, j);
        }
    }
}
