//! Offline correctness checker.
//!
//! Reads the trace logs written by both parties, reconstructs the plaintext
//! matrices by summing shares, recomputes the update rule
//! `u_i <- u_i + v_j * (1 - <u_i, v_j>)` in the ring and compares it against
//! the update the protocol actually produced.

use argh::FromArgs;
use itertools::izip;
use mfmpc::{
    ring,
    trace::{self, QueryTrace},
};
use ndarray::{Array1, Array2};

/// Verify a protocol run from the two parties' trace logs.
#[derive(FromArgs)]
struct Options {
    /// trace log written by party 0
    #[argh(positional)]
    trace0: String,

    /// trace log written by party 1
    #[argh(positional)]
    trace1: String,
}

fn main() {
    let options: Options = argh::from_env();
    let traces0 = trace::read_trace(&options.trace0).expect("Cannot read party 0 trace");
    let traces1 = trace::read_trace(&options.trace1).expect("Cannot read party 1 trace");

    if traces0.len() != traces1.len() {
        eprintln!(
            "Trace logs disagree on query count: {} vs {}",
            traces0.len(),
            traces1.len()
        );
        std::process::exit(1);
    }

    let mut failures = 0;
    for (trace0, trace1) in traces0.iter().zip(&traces1) {
        match check_query(trace0, trace1) {
            Ok((user, item)) => {
                println!("query {}: ok (user {}, item {})", trace0.index, user, item);
            }
            Err(message) => {
                eprintln!("query {}: {}", trace0.index, message);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        eprintln!("{} of {} queries failed", failures, traces0.len());
        std::process::exit(1);
    }
    println!("All {} queries verified", traces0.len());
}

/// Reconstruct one query's inputs and outputs and replay it in plaintext.
/// Returns the public user index and the reconstructed item index.
fn check_query(trace0: &QueryTrace, trace1: &QueryTrace) -> Result<(usize, usize), String> {
    if trace0.user != trace1.user {
        return Err(format!(
            "user index disagrees: {} vs {}",
            trace0.user, trace1.user
        ));
    }
    let user = trace0.user;
    let item = trace0.item_share.wrapping_add(trace1.item_share) as usize;

    let u = reconstruct(trace0, trace1, "u")?;
    let v = reconstruct(trace0, trace1, "v")?;
    let u_next = reconstruct(trace0, trace1, "u_next")?;

    if item >= v.nrows() {
        return Err(format!("item index {} out of range", item));
    }
    if user >= u.nrows() {
        return Err(format!("user index {} out of range", user));
    }

    let mut expected = u;
    update_row(&mut expected, &v, user, item);

    for (row, expected_row, actual_row) in izip!(0.., expected.rows(), u_next.rows()) {
        if expected_row != actual_row {
            return Err(format!(
                "row {} mismatch\n  expected: {}\n  got:      {}",
                row,
                Array1::from_iter(expected_row.iter().copied()),
                Array1::from_iter(actual_row.iter().copied()),
            ));
        }
    }
    Ok((user, item))
}

/// Sum the two parties' logged shares of a named matrix.
fn reconstruct(
    trace0: &QueryTrace,
    trace1: &QueryTrace,
    name: &str,
) -> Result<Array2<u32>, String> {
    let share0 = trace0
        .matrix(name)
        .ok_or_else(|| format!("party 0 trace is missing matrix {:?}", name))?;
    let share1 = trace1
        .matrix(name)
        .ok_or_else(|| format!("party 1 trace is missing matrix {:?}", name))?;
    ring::mat_add(share0.view(), share1.view())
        .map_err(|err| format!("matrix {:?}: {}", name, err))
}

/// The plaintext update rule, in the ring.
fn update_row(u: &mut Array2<u32>, v: &Array2<u32>, user: usize, item: usize) {
    let inner = ring::dot(u.row(user), v.row(item)).expect("row widths agree");
    let delta = 1u32.wrapping_sub(inner);
    let scaled: Array1<u32> = v.row(item).map(|&x| x.wrapping_mul(delta));
    let updated = ring::vec_add(u.row(user), scaled.view()).expect("row widths agree");
    u.row_mut(user).assign(&updated);
}

#[cfg(test)]
mod tests {
    use mfmpc::{
        messages::SessionHeader,
        shares,
        trace::{QueryTrace, TraceEntry},
    };
    use rand::{rngs::SmallRng, SeedableRng};

    use super::*;

    fn make_traces(tamper: bool) -> (QueryTrace, QueryTrace) {
        let mut rng = SmallRng::from_seed([61; 32]);
        let header = SessionHeader {
            users: 2,
            items: 3,
            features: 2,
            queries: 1,
        };
        let u = shares::random_mat(&mut rng, header.users, header.features);
        let v = shares::random_mat(&mut rng, header.items, header.features);
        let (user, item) = (1usize, 2usize);

        let mut u_next = u.clone();
        update_row(&mut u_next, &v, user, item);
        if tamper {
            u_next[[user, 0]] = u_next[[user, 0]].wrapping_add(1);
        }

        let (u0, u1) = shares::share_mat(&mut rng, u.view());
        let (v0, v1) = shares::share_mat(&mut rng, v.view());
        let (n0, n1) = shares::share_mat(&mut rng, u_next.view());
        let (item0, item1) = shares::share_scalar(&mut rng, item as u32);

        let build = |item_share, u, v, u_next| QueryTrace {
            index: 0,
            user,
            item_share,
            entries: vec![
                TraceEntry::Matrix("u".to_string(), u),
                TraceEntry::Matrix("v".to_string(), v),
                TraceEntry::Matrix("u_next".to_string(), u_next),
            ],
        };
        (build(item0, u0, v0, n0), build(item1, u1, v1, n1))
    }

    #[test]
    fn consistent_traces_pass() {
        let (trace0, trace1) = make_traces(false);
        let (user, item) = check_query(&trace0, &trace1).unwrap();
        assert_eq!((user, item), (1, 2));
    }

    #[test]
    fn tampered_update_is_detected() {
        let (trace0, trace1) = make_traces(true);
        let err = check_query(&trace0, &trace1).unwrap_err();
        assert!(err.contains("row 1 mismatch"), "unexpected error: {}", err);
    }

    #[test]
    fn missing_matrix_is_reported() {
        let (trace0, mut trace1) = make_traces(false);
        trace1.entries.truncate(2);
        let err = check_query(&trace0, &trace1).unwrap_err();
        assert!(err.contains("u_next"), "unexpected error: {}", err);
    }
}
