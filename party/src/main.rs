use argh::FromArgs;
use mfmpc::{
    queryfile::QueryFile,
    session,
    trace::TraceWriter,
    transport::{self, wrap_bincode, Link, NetworkConfig},
    PartyState, Role, Session, DEALER_ID,
};
use rand::{rngs::StdRng, SeedableRng};

/// Data party for the secure matrix-factorization update protocol.
#[derive(FromArgs)]
struct Options {
    /// path to the network configuration file
    #[argh(option)]
    config: String,

    /// this party's ID (0 or 1)
    #[argh(option)]
    id: usize,

    /// path to this party's query file
    #[argh(option)]
    queries: String,

    /// optional path for the per-query trace log
    #[argh(option)]
    trace: Option<String>,
}

#[tokio::main]
async fn main() {
    let options: Options = argh::from_env();
    let role = Role::from_id(options.id).expect("Party ID must be 0 or 1");
    let config = NetworkConfig::load(&options.config).expect("Invalid config");
    let query_file = QueryFile::load(&options.queries).expect("Invalid query file");
    let header = query_file.header;

    let mut rng = StdRng::from_entropy();
    let mut state = PartyState::random(header, &mut rng);

    println!("Party {} connecting to dealer at {}", role.id(), config.dealer);
    let dealer_stream = transport::connect_to(config.dealer, role.id())
        .await
        .expect("Dealer connection failed");
    let mut dealer = Link::new(wrap_bincode(dealer_stream), DEALER_ID);

    // Party 1 listens for the peer connection; party 0 dials it.
    let peer_stream = match role {
        Role::Party0 => transport::connect_to(config.parties[1], 0).await,
        Role::Party1 => transport::listen_for(config.parties[1], &[0])
            .await
            .map(|mut streams| streams.pop().expect("missing peer stream")),
    }
    .expect("Peer connection failed");
    let mut peer = Link::new(wrap_bincode(peer_stream), role.peer().id());

    session::hello_dealer(&mut dealer, role, &header)
        .await
        .expect("Dealer handshake failed");
    session::hello_peer(&mut peer, role, &header)
        .await
        .expect("Peer handshake failed");
    println!(
        "Party {} connected, processing {} queries",
        role.id(),
        header.queries
    );

    let mut trace = options
        .trace
        .as_ref()
        .map(|path| TraceWriter::create(path).expect("Cannot create trace log"));

    let mut session = Session::new(role, &mut state, &mut dealer, &mut peer, trace.as_mut());
    if let Err(err) = session.run(&query_file.queries).await {
        eprintln!("Party {} aborted: {}", role.id(), err);
        std::process::exit(1);
    }

    println!("Party {} finished {} queries", role.id(), header.queries);
}
