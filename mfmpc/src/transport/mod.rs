//! Message channels between the three protocol processes.
//!
//! Every channel carries length-framed bincode messages. A party holds two
//! links: one to the dealer and one to the peer party. The dealer holds one
//! link per party.

mod config;
mod networking;

pub use config::NetworkConfig;
pub use networking::{connect_to, listen_for};

use std::fmt;

use futures::{
    stream::{SplitSink, SplitStream},
    Sink, SinkExt, Stream, StreamExt,
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_serde::formats::Bincode;
use tokio_util::codec::LengthDelimitedCodec;

/// Error type for channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    Send(usize),
    Recv(usize),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Send(id) => write!(f, "Error while sending message to {}", id),
            Self::Recv(id) => write!(f, "Error while receiving message from {}", id),
        }
    }
}

/// One end of a bidirectional message channel to another protocol process.
pub struct Link<T, Channel> {
    sink: SplitSink<Channel, T>,
    stream: SplitStream<Channel>,
    peer: usize,
}

impl<T, Channel> Link<T, Channel>
where
    Channel: Stream + Sink<T>,
{
    /// Wrap a connection to the process with wire ID `peer`.
    /// The stream is split into unidirectional halves so that a send and a
    /// receive can be awaited concurrently without fighting the borrow
    /// checker.
    pub fn new(channel: Channel, peer: usize) -> Self {
        let (sink, stream) = channel.split();
        Self { sink, stream, peer }
    }
}

impl<T, Channel> Link<T, Channel> {
    /// Wire ID of the process on the other end.
    pub fn peer(&self) -> usize {
        self.peer
    }
}

impl<T, E, Channel> Link<T, Channel>
where
    Channel: Stream<Item = Result<T, E>> + Sink<T> + Unpin,
{
    /// Send one message.
    pub async fn send(&mut self, msg: T) -> Result<(), TransportError> {
        self.sink
            .send(msg)
            .await
            .map_err(|_| TransportError::Send(self.peer))
    }

    /// Receive one message.
    pub async fn recv(&mut self) -> Result<T, TransportError> {
        match self.stream.next().await {
            Some(Ok(msg)) => Ok(msg),
            _ => Err(TransportError::Recv(self.peer)),
        }
    }

    /// Send one message and receive the counterpart message of the same
    /// exchange. Both directions complete before this returns, which keeps
    /// the two parties in lock-step without deadlocking on large frames.
    pub async fn exchange(&mut self, msg: T) -> Result<T, TransportError> {
        let peer = self.peer;
        let send = self.sink.send(msg);
        let recv = self.stream.next();
        let (sent, received) = futures::join!(send, recv);
        sent.map_err(|_| TransportError::Send(peer))?;
        match received {
            Some(Ok(msg)) => Ok(msg),
            _ => Err(TransportError::Recv(peer)),
        }
    }
}

/// Length-framed Bincode-encoded messages channel.
pub type BincodeStreamSink<T, C> =
    tokio_serde::Framed<tokio_util::codec::Framed<C, LengthDelimitedCodec>, T, T, Bincode<T, T>>;

/// Length-framed Bincode-encoded tokio's Duplex stream.
pub type BincodeDuplex<T> = BincodeStreamSink<T, DuplexStream>;

/// Create length-framed Bincode-encoded message channel from AsyncRead/Write.
pub fn wrap_bincode<T, C>(channel: C) -> BincodeStreamSink<T, C>
where
    C: AsyncRead + AsyncWrite,
{
    let length_delimited = tokio_util::codec::Framed::new(channel, LengthDelimitedCodec::new());
    tokio_serde::Framed::new(length_delimited, Bincode::default())
}

/// Create bidirectional Bincode-encoded channel.
pub fn bincode_duplex<T>(max_buf_size: usize) -> (BincodeDuplex<T>, BincodeDuplex<T>) {
    let (a, b) = tokio::io::duplex(max_buf_size);
    (wrap_bincode(a), wrap_bincode(b))
}

/// Create a linked pair of in-process channels for testing protocol flows.
/// The first link reports peer ID `id_b`, the second `id_a`.
pub fn link_pair<T>(
    id_a: usize,
    id_b: usize,
    max_buf_size: usize,
) -> (Link<T, BincodeDuplex<T>>, Link<T, BincodeDuplex<T>>)
where
    T: serde::Serialize + serde::de::DeserializeOwned + Unpin,
{
    let (a, b) = bincode_duplex(max_buf_size);
    (Link::new(a, id_b), Link::new(b, id_a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_and_receive() {
        let (mut a, mut b) = link_pair::<u32>(0, 1, 1 << 16);
        a.send(42).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn exchange_swaps_values() {
        let (mut a, mut b) = link_pair::<u32>(0, 1, 1 << 16);
        let (from_b, from_a) = futures::join!(a.exchange(7), b.exchange(9));
        assert_eq!(from_b.unwrap(), 9);
        assert_eq!(from_a.unwrap(), 7);
    }

    #[tokio::test]
    async fn recv_after_close_is_disconnect() {
        let (a, mut b) = link_pair::<u32>(0, 1, 1 << 16);
        drop(a);
        assert_eq!(b.recv().await, Err(TransportError::Recv(0)));
    }
}
