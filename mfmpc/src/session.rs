//! Per-query orchestration for a data party.
//!
//! Both parties run the identical code path; the role only decides the sign
//! convention for the delta share and which endpoint listens for the peer
//! connection. One session processes its queries strictly in order: a query
//! never starts before the previous update has been applied, and every
//! exchange within a query completes before the next step runs.

use futures::{Sink, Stream};
use ndarray::{Array1, Array2};
use rand::Rng;

use crate::{
    align,
    messages::{self, DealerMessage, PeerMessage, SessionHeader, PROTOCOL_VERSION},
    queryfile::Query,
    ring, secmul, shares,
    trace::TraceWriter,
    transport::Link,
    ProtocolError,
};

/// Which data party this process is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Party0,
    Party1,
}

impl Role {
    pub fn from_id(id: usize) -> Option<Role> {
        match id {
            0 => Some(Role::Party0),
            1 => Some(Role::Party1),
            _ => None,
        }
    }

    pub fn id(self) -> usize {
        match self {
            Role::Party0 => 0,
            Role::Party1 => 1,
        }
    }

    pub fn peer(self) -> Role {
        match self {
            Role::Party0 => Role::Party1,
            Role::Party1 => Role::Party0,
        }
    }

    /// The primary party contributes the constant 1 to the delta shares,
    /// so that the shares sum to `1 - <u_i, v_j>`.
    pub fn is_primary(self) -> bool {
        matches!(self, Role::Party0)
    }
}

/// One party's mutable protocol state: its additive shares of the user and
/// item matrices plus the startup mask for the item table.
pub struct PartyState {
    pub header: SessionHeader,
    /// Share of the user matrix U, users-by-features.
    pub u: Array2<u32>,
    /// Share of the item matrix V, items-by-features.
    pub v: Array2<u32>,
    /// Random mask matrix drawn once at startup, same shape as V.
    pub r: Array2<u32>,
    /// Precomputed masked table `v + r`, exchanged with the peer per query.
    pub v_dash: Array2<u32>,
}

impl PartyState {
    /// Fresh state with uniformly random share matrices.
    pub fn random(header: SessionHeader, rng: &mut impl Rng) -> Self {
        let u = shares::random_mat(rng, header.users, header.features);
        let v = shares::random_mat(rng, header.items, header.features);
        let r = shares::random_mat(rng, header.items, header.features);
        let v_dash = ring::mat_add(v.view(), r.view()).expect("v and r share a shape");
        Self {
            header,
            u,
            v,
            r,
            v_dash,
        }
    }

    /// State over caller-provided shares. Shapes must match the header.
    pub fn from_parts(
        header: SessionHeader,
        u: Array2<u32>,
        v: Array2<u32>,
        r: Array2<u32>,
    ) -> Result<Self, ProtocolError> {
        let check = |shape: &[usize], rows: usize| -> Result<(), ProtocolError> {
            if shape != [rows, header.features] {
                return Err(ProtocolError::DimensionMismatch {
                    left: shape.to_vec(),
                    right: vec![rows, header.features],
                });
            }
            Ok(())
        };
        check(u.shape(), header.users)?;
        check(v.shape(), header.items)?;
        check(r.shape(), header.items)?;
        let v_dash = ring::mat_add(v.view(), r.view())?;
        Ok(Self {
            header,
            u,
            v,
            r,
            v_dash,
        })
    }
}

/// Handshake with the dealer: announce our header, expect a matching echo.
pub async fn hello_dealer<E, C>(
    link: &mut Link<DealerMessage, C>,
    role: Role,
    header: &SessionHeader,
) -> Result<(), ProtocolError>
where
    C: Stream<Item = Result<DealerMessage, E>> + Sink<DealerMessage> + Unpin,
{
    link.send(DealerMessage::Hello {
        version: PROTOCOL_VERSION,
        party: role.id(),
        header: *header,
    })
    .await?;
    match link.recv().await? {
        DealerMessage::Hello {
            version,
            header: theirs,
            ..
        } => messages::check_hello(version, &theirs, header),
        _ => Err(ProtocolError::UnexpectedMessage {
            step: "dealer handshake",
        }),
    }
}

/// Handshake with the peer party: both sides must agree on version and header.
pub async fn hello_peer<E, C>(
    link: &mut Link<PeerMessage, C>,
    role: Role,
    header: &SessionHeader,
) -> Result<(), ProtocolError>
where
    C: Stream<Item = Result<PeerMessage, E>> + Sink<PeerMessage> + Unpin,
{
    let reply = link
        .exchange(PeerMessage::Hello {
            version: PROTOCOL_VERSION,
            party: role.id(),
            header: *header,
        })
        .await?;
    match reply {
        PeerMessage::Hello {
            version,
            party,
            header: theirs,
        } => {
            if party != role.peer().id() {
                return Err(ProtocolError::UnexpectedMessage {
                    step: "peer handshake",
                });
            }
            messages::check_hello(version, &theirs, header)
        }
        _ => Err(ProtocolError::UnexpectedMessage {
            step: "peer handshake",
        }),
    }
}

/// Orchestrator for one party's session.
pub struct Session<'a, D, P> {
    role: Role,
    state: &'a mut PartyState,
    dealer: &'a mut Link<DealerMessage, D>,
    peer: &'a mut Link<PeerMessage, P>,
    trace: Option<&'a mut TraceWriter>,
}

impl<'a, D, P, ED, EP> Session<'a, D, P>
where
    D: Stream<Item = Result<DealerMessage, ED>> + Sink<DealerMessage> + Unpin,
    P: Stream<Item = Result<PeerMessage, EP>> + Sink<PeerMessage> + Unpin,
{
    pub fn new(
        role: Role,
        state: &'a mut PartyState,
        dealer: &'a mut Link<DealerMessage, D>,
        peer: &'a mut Link<PeerMessage, P>,
        trace: Option<&'a mut TraceWriter>,
    ) -> Self {
        Self {
            role,
            state,
            dealer,
            peer,
            trace,
        }
    }

    /// Process every query in order. On error the session is dead: the
    /// failed query's update is not applied and nothing is retried.
    pub async fn run(&mut self, queries: &[Query]) -> Result<(), ProtocolError> {
        if queries.len() != self.state.header.queries {
            return Err(ProtocolError::HeaderMismatch);
        }
        for (index, query) in queries.iter().enumerate() {
            self.run_query(index, query).await?;
        }
        Ok(())
    }

    async fn run_query(&mut self, index: usize, query: &Query) -> Result<(), ProtocolError> {
        let header = self.state.header;
        let features = header.features;
        if query.user >= header.users {
            return Err(ProtocolError::at(
                index,
                "query input",
                ProtocolError::OutOfRange {
                    index: query.user,
                    len: header.users,
                },
            ));
        }

        if let Some(trace) = self.trace.as_deref_mut() {
            trace.begin_query(index, query)?;
            trace.matrix("u", self.state.u.view())?;
            trace.matrix("v", self.state.v.view())?;
            trace.matrix("r", self.state.r.view())?;
        }

        // Correlated randomness for this query, fresh from the dealer.
        let step = |name| move |err| ProtocolError::at(index, name, err);
        let randomness = match self.dealer.recv().await.map_err(ProtocolError::from) {
            Ok(DealerMessage::Randomness(bundle)) => *bundle,
            Ok(_) => {
                return Err(step("correlated randomness")(ProtocolError::UnexpectedMessage {
                    step: "correlated randomness",
                }))
            }
            Err(err) => return Err(step("correlated randomness")(err)),
        };
        randomness
            .validate(&header)
            .map_err(step("correlated randomness"))?;

        // Rotate the dealer's one-hot share onto the secret item index.
        let one_hot_share = align::align_one_hot(
            self.peer,
            query.item_share,
            randomness.alpha_share,
            randomness.e_alpha.view(),
        )
        .await
        .map_err(step("index alignment"))?;

        // Swap masked item tables, then fold in our own mask again so the
        // combined table mixes both real shares and both masks.
        let reply = self
            .peer
            .exchange(PeerMessage::MaskedTable(self.state.v_dash.clone()))
            .await
            .map_err(ProtocolError::from)
            .map_err(step("table exchange"))?;
        let v_dash_peer = match reply {
            PeerMessage::MaskedTable(table) => table,
            _ => {
                return Err(step("table exchange")(ProtocolError::UnexpectedMessage {
                    step: "table exchange",
                }))
            }
        };
        let v_masked = ring::mat_add(self.state.v_dash.view(), v_dash_peer.view())
            .and_then(|sum| ring::mat_add(sum.view(), self.state.r.view()))
            .map_err(step("table exchange"))?;

        // Masked share of the target item row.
        let lookup = ring::select_row(one_hot_share.view(), v_masked.view())
            .map_err(step("masked lookup"))?;

        // Strip the table mask: subtract the locally known cross term and a
        // secure share of the full mask row.
        let one_hot_table = ring::broadcast_cols(one_hot_share.view(), features);
        let mask_row_share = secmul::secure_select(
            self.peer,
            one_hot_table.view(),
            self.state.r.view(),
            &randomness.table,
        )
        .await
        .map_err(step("table unmask"))?;
        let local_cross = ring::select_row(one_hot_share.view(), self.state.r.view())
            .map_err(step("table unmask"))?;
        let item_row_share = ring::vec_sub(lookup.view(), local_cross.view())
            .and_then(|partial| ring::vec_sub(partial.view(), mask_row_share.view()))
            .map_err(step("table unmask"))?;

        // Share of <u_i, v_j>.
        let user_row = self.state.u.row(query.user).to_owned();
        let inner_share = secmul::secure_dot(
            self.peer,
            user_row.view(),
            item_row_share.view(),
            &randomness.inner,
        )
        .await
        .map_err(step("inner product"))?;

        // Shares of delta = 1 - <u_i, v_j>: the constant 1 comes from the
        // primary party only.
        let delta_share = if self.role.is_primary() {
            1u32.wrapping_sub(inner_share)
        } else {
            inner_share.wrapping_neg()
        };
        let delta_broadcast = Array1::from_elem(features, delta_share);

        // Share of v_j * delta.
        let update_share = secmul::secure_scalar(
            self.peer,
            item_row_share.view(),
            delta_broadcast.view(),
            &randomness.scalar,
        )
        .await
        .map_err(step("update product"))?;

        // Apply the update to our share of the user row.
        let new_row = ring::vec_add(self.state.u.row(query.user), update_share.view())
            .map_err(step("apply update"))?;
        self.state.u.row_mut(query.user).assign(&new_row);

        if let Some(trace) = self.trace.as_deref_mut() {
            trace.vector("one_hot", one_hot_share.view())?;
            trace.matrix("v_masked", v_masked.view())?;
            trace.vector("lookup", lookup.view())?;
            trace.vector("item_row", item_row_share.view())?;
            trace.scalar("inner", inner_share)?;
            trace.scalar("delta", delta_share)?;
            trace.vector("update", update_share.view())?;
            trace.matrix("u_next", self.state.u.view())?;
            trace.end_query()?;
        }

        Ok(())
    }
}
