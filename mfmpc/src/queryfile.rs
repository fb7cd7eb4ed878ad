//! Query files.
//!
//! Each party reads one text file at startup: a header line `m n k Q`
//! followed by Q lines of `user item_share`. The user index is public and
//! identical across the two files; the item shares are full-ring values
//! whose wrapped sum is the secret item index.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use crate::{messages::SessionHeader, ProtocolError};

/// One parsed query line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Query {
    /// Public user index, a row of U.
    pub user: usize,
    /// This party's additive share of the secret item index.
    pub item_share: u32,
}

/// A parsed query file.
#[derive(Clone, Debug)]
pub struct QueryFile {
    pub header: SessionHeader,
    pub queries: Vec<Query>,
}

impl QueryFile {
    /// Load and validate a query file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse query-file text.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut tokens = text.split_whitespace();
        let mut next_number = |what: &str| -> Result<u64, ProtocolError> {
            let token = tokens
                .next()
                .ok_or_else(|| invalid(format!("missing {}", what)))?;
            token
                .parse()
                .map_err(|_| invalid(format!("invalid {}: {:?}", what, token)))
        };

        let header = SessionHeader {
            users: next_number("user count")? as usize,
            items: next_number("item count")? as usize,
            features: next_number("feature count")? as usize,
            queries: next_number("query count")? as usize,
        };
        header.validate()?;

        let mut queries = Vec::with_capacity(header.queries);
        for _ in 0..header.queries {
            let user = next_number("user index")? as usize;
            if user >= header.users {
                return Err(ProtocolError::OutOfRange {
                    index: user,
                    len: header.users,
                });
            }
            let item_share = next_number("item share")?;
            if item_share > u32::MAX as u64 {
                return Err(invalid(format!("item share {} exceeds ring width", item_share)));
            }
            queries.push(Query {
                user,
                item_share: item_share as u32,
            });
        }
        if tokens.next().is_some() {
            return Err(invalid("trailing data after last query".to_string()));
        }

        Ok(QueryFile { header, queries })
    }

    /// Write the file in the shared text format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProtocolError> {
        let mut out = io::BufWriter::new(fs::File::create(path)?);
        writeln!(
            out,
            "{} {} {} {}",
            self.header.users, self.header.items, self.header.features, self.header.queries
        )?;
        for query in &self.queries {
            writeln!(out, "{} {}", query.user, query.item_share)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn invalid(message: String) -> ProtocolError {
    ProtocolError::Io(io::Error::new(io::ErrorKind::InvalidData, message))
}
