use argh::FromArgs;
use futures::{Sink, Stream};
use mfmpc::{
    messages::{check_hello, DealerMessage, SessionHeader, PROTOCOL_VERSION},
    randomness::{self, QueryRandomness},
    transport::{self, wrap_bincode, Link, NetworkConfig},
    ProtocolError, DEALER_ID,
};
use rand::{rngs::StdRng, SeedableRng};

/// Correlated-randomness dealer for the secure update protocol.
#[derive(FromArgs)]
struct Options {
    /// path to the network configuration file
    #[argh(option)]
    config: String,
}

#[tokio::main]
async fn main() {
    let options: Options = argh::from_env();
    let config = NetworkConfig::load(&options.config).expect("Invalid config");

    println!("Dealer listening on {}", config.dealer);
    let mut streams = transport::listen_for(config.dealer, &[0, 1])
        .await
        .expect("Party connections failed");
    let stream1 = streams.pop().expect("missing party 1");
    let stream0 = streams.pop().expect("missing party 0");
    let mut link0: Link<DealerMessage, _> = Link::new(wrap_bincode(stream0), 0);
    let mut link1: Link<DealerMessage, _> = Link::new(wrap_bincode(stream1), 1);

    let header = agree_header(&mut link0, &mut link1)
        .await
        .expect("Session handshake failed");
    println!(
        "Session agreed: {} users, {} items, {} features, {} queries",
        header.users, header.items, header.features, header.queries
    );

    // Everything is generated before anything is sent, so the per-query
    // bundles of the two parties stay mutually consistent no matter how the
    // two sessions interleave.
    let mut rng = StdRng::from_entropy();
    let batch = randomness::generate_batch(&mut rng, &header)
        .expect("Randomness generation failed");
    let (bundles0, bundles1): (Vec<_>, Vec<_>) = batch.into_iter().unzip();

    let (served0, served1) = futures::join!(
        serve_party(&mut link0, bundles0),
        serve_party(&mut link1, bundles1),
    );
    served0.expect("Serving party 0 failed");
    served1.expect("Serving party 1 failed");
    println!("All randomness delivered, shutting down");
}

/// Receive both hellos, check that the parties agree, and echo the header
/// back as the go-ahead.
async fn agree_header<E0, E1, C0, C1>(
    link0: &mut Link<DealerMessage, C0>,
    link1: &mut Link<DealerMessage, C1>,
) -> Result<SessionHeader, ProtocolError>
where
    C0: Stream<Item = Result<DealerMessage, E0>> + Sink<DealerMessage> + Unpin,
    C1: Stream<Item = Result<DealerMessage, E1>> + Sink<DealerMessage> + Unpin,
{
    let (version0, header0) = expect_hello(link0.recv().await?)?;
    let (version1, header1) = expect_hello(link1.recv().await?)?;
    check_hello(version0, &header0, &header0)?;
    check_hello(version1, &header1, &header0)?;
    header0.validate()?;

    let echo = DealerMessage::Hello {
        version: PROTOCOL_VERSION,
        party: DEALER_ID,
        header: header0,
    };
    link0.send(echo.clone()).await?;
    link1.send(echo).await?;
    Ok(header0)
}

fn expect_hello(msg: DealerMessage) -> Result<(u32, SessionHeader), ProtocolError> {
    match msg {
        DealerMessage::Hello {
            version, header, ..
        } => Ok((version, header)),
        _ => Err(ProtocolError::UnexpectedMessage {
            step: "dealer handshake",
        }),
    }
}

/// Stream one party's bundles in query order, then hang up.
async fn serve_party<E, C>(
    link: &mut Link<DealerMessage, C>,
    bundles: Vec<QueryRandomness>,
) -> Result<(), ProtocolError>
where
    C: Stream<Item = Result<DealerMessage, E>> + Sink<DealerMessage> + Unpin,
{
    let party = link.peer();
    for (index, bundle) in bundles.into_iter().enumerate() {
        link.send(DealerMessage::Randomness(Box::new(bundle)))
            .await?;
        println!("Dealer -> party {}: sent query {} randomness", party, index);
    }
    Ok(())
}
