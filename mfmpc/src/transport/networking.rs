use std::{io, net::SocketAddr, time::Duration};

use futures::{stream::FuturesUnordered, StreamExt};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Delay in milliseconds after which connection to a listening process is retried.
const CONNECTION_RETRY_DELAY: u64 = 1000;

/// Magic word opening every raw TCP handshake.
const HANDSHAKE_MAGIC: u32 = 0x4F424C56;

/// Connect to the process listening at `addr`, announcing our wire ID.
/// Retries until the listener is up, then performs the magic handshake.
pub async fn connect_to(addr: SocketAddr, self_id: usize) -> Result<TcpStream, io::Error> {
    let mut socket = loop {
        match TcpStream::connect(addr).await {
            Ok(socket) => break socket,
            _ => tokio::time::sleep(Duration::from_millis(CONNECTION_RETRY_DELAY)).await,
        }
    };

    socket.write_u32(HANDSHAKE_MAGIC).await?;
    socket.write_u32(self_id as u32).await?;
    socket.flush().await?;

    if socket.read_u32().await? != HANDSHAKE_MAGIC {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid magic"));
    }

    Ok(socket)
}

/// Listen on `addr` until every process in `expected_ids` has connected and
/// completed the handshake. Returned streams are ordered like `expected_ids`.
pub async fn listen_for(
    addr: SocketAddr,
    expected_ids: &[usize],
) -> Result<Vec<TcpStream>, io::Error> {
    if expected_ids.is_empty() {
        return Ok(Vec::new());
    }

    let listener = TcpListener::bind(addr).await?;
    let mut futures = FuturesUnordered::new();
    let mut connected: Vec<Option<TcpStream>> = expected_ids.iter().map(|_| None).collect();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, _) = accepted?;
                futures.push(accept_process(expected_ids, socket));
            },
            handshaken = futures.next(), if !futures.is_empty() => {
                if let Some(Ok((socket, slot))) = handshaken {
                    if connected[slot].is_none() {
                        connected[slot] = Some(socket);
                        if connected.iter().all(|x| x.is_some()) {
                            break;
                        }
                    }
                }
            },
        }
    }

    Ok(connected
        .into_iter()
        .map(|socket| socket.expect("all slots filled"))
        .collect())
}

/// Complete the handshake on an incoming connection and match the announced
/// ID against the expected set.
async fn accept_process(
    expected_ids: &[usize],
    mut socket: TcpStream,
) -> Result<(TcpStream, usize), io::Error> {
    if socket.read_u32().await? != HANDSHAKE_MAGIC {
        return Err(io::Error::new(io::ErrorKind::Other, "Invalid magic"));
    }

    let id = socket.read_u32().await? as usize;
    let slot = expected_ids
        .iter()
        .position(|&expected| expected == id)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Unexpected process ID"))?;

    socket.write_u32(HANDSHAKE_MAGIC).await?;
    socket.flush().await?;

    Ok((socket, slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_orders_streams_by_id() {
        let listener_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpListener::bind(listener_addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let accept = listen_for(addr, &[0, 1]);
        let connect = async {
            // Connect out of order; the listener sorts by announced ID.
            let b = connect_to(addr, 1).await.unwrap();
            let a = connect_to(addr, 0).await.unwrap();
            (a, b)
        };
        let (accepted, _) = futures::join!(accept, connect);
        assert_eq!(accepted.unwrap().len(), 2);
    }
}
