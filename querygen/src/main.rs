//! Generate a consistent pair of query files for the two data parties.
//!
//! Every query draws a public user index and a secret item index; the item
//! index is split into two full-ring additive shares, one per output file,
//! so neither file alone reveals which item is queried.

use argh::FromArgs;
use mfmpc::{
    messages::SessionHeader,
    queryfile::{Query, QueryFile},
    shares,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Query-file generator for the secure update protocol.
#[derive(FromArgs)]
struct Options {
    /// number of users
    #[argh(option)]
    users: usize,

    /// number of items
    #[argh(option)]
    items: usize,

    /// number of features
    #[argh(option)]
    features: usize,

    /// number of queries
    #[argh(option)]
    queries: usize,

    /// output file for party 0
    #[argh(option, default = "String::from(\"f0.txt\")")]
    out0: String,

    /// output file for party 1
    #[argh(option, default = "String::from(\"f1.txt\")")]
    out1: String,
}

fn main() {
    let options: Options = argh::from_env();
    let header = SessionHeader {
        users: options.users,
        items: options.items,
        features: options.features,
        queries: options.queries,
    };
    header.validate().expect("Invalid session dimensions");

    let mut rng = StdRng::from_entropy();
    let mut queries0 = Vec::with_capacity(header.queries);
    let mut queries1 = Vec::with_capacity(header.queries);
    for _ in 0..header.queries {
        let user = rng.gen_range(0..header.users);
        let item = rng.gen_range(0..header.items as u32);
        let (share0, share1) = shares::share_scalar(&mut rng, item);
        queries0.push(Query {
            user,
            item_share: share0,
        });
        queries1.push(Query {
            user,
            item_share: share1,
        });
    }

    QueryFile {
        header,
        queries: queries0,
    }
    .save(&options.out0)
    .expect("Cannot write party 0 query file");
    QueryFile {
        header,
        queries: queries1,
    }
    .save(&options.out1)
    .expect("Cannot write party 1 query file");

    println!(
        "Wrote {} queries to {} and {}",
        header.queries, options.out0, options.out1
    );
}
