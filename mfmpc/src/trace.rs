//! Per-query trace logs.
//!
//! When asked, a party appends every intermediate value of each query to a
//! text log. The logs are not part of the protocol: they exist so the
//! offline checker can reconstruct both parties' shares and re-derive the
//! update in plaintext.
//!
//! Format, repeated per query:
//!
//! ```text
//! query 0
//! user 2
//! item_share 12345
//! matrix u 3 2
//! 1 2
//! ...
//! vector one_hot 4
//! 7 0 0 1
//! scalar delta 9
//! end
//! ```

use std::{
    fs,
    io::{self, BufWriter, Write},
    path::Path,
};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::{queryfile::Query, ProtocolError};

/// Streaming writer for one party's trace log.
pub struct TraceWriter {
    out: BufWriter<fs::File>,
}

impl TraceWriter {
    /// Create (truncate) the log file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        Ok(Self {
            out: BufWriter::new(fs::File::create(path)?),
        })
    }

    /// Open a new query record.
    pub fn begin_query(&mut self, index: usize, query: &Query) -> Result<(), ProtocolError> {
        writeln!(self.out, "query {}", index)?;
        writeln!(self.out, "user {}", query.user)?;
        writeln!(self.out, "item_share {}", query.item_share)?;
        Ok(())
    }

    pub fn matrix(&mut self, name: &str, values: ArrayView2<u32>) -> Result<(), ProtocolError> {
        writeln!(self.out, "matrix {} {} {}", name, values.nrows(), values.ncols())?;
        for row in values.rows() {
            write_row(&mut self.out, row)?;
        }
        Ok(())
    }

    pub fn vector(&mut self, name: &str, values: ArrayView1<u32>) -> Result<(), ProtocolError> {
        writeln!(self.out, "vector {} {}", name, values.len())?;
        write_row(&mut self.out, values)?;
        Ok(())
    }

    pub fn scalar(&mut self, name: &str, value: u32) -> Result<(), ProtocolError> {
        writeln!(self.out, "scalar {} {}", name, value)?;
        Ok(())
    }

    /// Close the current query record and flush it to disk.
    pub fn end_query(&mut self) -> Result<(), ProtocolError> {
        writeln!(self.out, "end")?;
        self.out.flush()?;
        Ok(())
    }
}

fn write_row(out: &mut impl Write, values: ArrayView1<u32>) -> io::Result<()> {
    let mut first = true;
    for value in values {
        if first {
            write!(out, "{}", value)?;
            first = false;
        } else {
            write!(out, " {}", value)?;
        }
    }
    writeln!(out)
}

/// One named value recorded in a query trace.
#[derive(Clone, Debug)]
pub enum TraceEntry {
    Matrix(String, Array2<u32>),
    Vector(String, Array1<u32>),
    Scalar(String, u32),
}

/// All values recorded for one query.
#[derive(Clone, Debug)]
pub struct QueryTrace {
    pub index: usize,
    pub user: usize,
    pub item_share: u32,
    pub entries: Vec<TraceEntry>,
}

impl QueryTrace {
    pub fn matrix(&self, name: &str) -> Option<&Array2<u32>> {
        self.entries.iter().find_map(|entry| match entry {
            TraceEntry::Matrix(n, values) if n == name => Some(values),
            _ => None,
        })
    }

    pub fn vector(&self, name: &str) -> Option<&Array1<u32>> {
        self.entries.iter().find_map(|entry| match entry {
            TraceEntry::Vector(n, values) if n == name => Some(values),
            _ => None,
        })
    }

    pub fn scalar(&self, name: &str) -> Option<u32> {
        self.entries.iter().find_map(|entry| match entry {
            TraceEntry::Scalar(n, value) if n == name => Some(*value),
            _ => None,
        })
    }
}

/// Parse a whole trace log.
pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<QueryTrace>, ProtocolError> {
    parse_trace(&fs::read_to_string(path)?)
}

/// Parse trace text.
pub fn parse_trace(text: &str) -> Result<Vec<QueryTrace>, ProtocolError> {
    let mut lines = text.lines();
    let mut queries = Vec::new();

    while let Some(line) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let index = field(line, "query")?;
        let user = field(lines.next().unwrap_or(""), "user")?;
        let item_share = field(lines.next().unwrap_or(""), "item_share")?;
        let mut entries = Vec::new();

        loop {
            let line = lines.next().ok_or_else(|| invalid("missing end marker"))?;
            let mut words = line.split_whitespace();
            match words.next() {
                Some("end") => break,
                Some("matrix") => {
                    let name = words.next().ok_or_else(|| invalid("missing matrix name"))?;
                    let rows: usize = parse_word(words.next(), "matrix rows")?;
                    let cols: usize = parse_word(words.next(), "matrix cols")?;
                    let mut values = Array2::zeros((rows, cols));
                    for r in 0..rows {
                        let row_line = lines.next().ok_or_else(|| invalid("missing matrix row"))?;
                        read_row(row_line, values.row_mut(r))?;
                    }
                    entries.push(TraceEntry::Matrix(name.to_string(), values));
                }
                Some("vector") => {
                    let name = words.next().ok_or_else(|| invalid("missing vector name"))?;
                    let len: usize = parse_word(words.next(), "vector length")?;
                    let mut values = Array1::zeros(len);
                    let row_line = lines.next().ok_or_else(|| invalid("missing vector row"))?;
                    read_row(row_line, values.view_mut())?;
                    entries.push(TraceEntry::Vector(name.to_string(), values));
                }
                Some("scalar") => {
                    let name = words.next().ok_or_else(|| invalid("missing scalar name"))?;
                    let value: u32 = parse_word(words.next(), "scalar value")?;
                    entries.push(TraceEntry::Scalar(name.to_string(), value));
                }
                other => {
                    return Err(invalid(&format!("unexpected trace line: {:?}", other)));
                }
            }
        }

        queries.push(QueryTrace {
            index,
            user,
            item_share: item_share as u32,
            entries,
        });
    }

    Ok(queries)
}

fn field(line: &str, key: &str) -> Result<usize, ProtocolError> {
    let mut words = line.split_whitespace();
    if words.next() != Some(key) {
        return Err(invalid(&format!("expected {:?} line, got {:?}", key, line)));
    }
    parse_word(words.next(), key)
}

fn parse_word<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T, ProtocolError> {
    word.ok_or_else(|| invalid(&format!("missing {}", what)))?
        .parse()
        .map_err(|_| invalid(&format!("invalid {}", what)))
}

fn read_row(line: &str, mut slot: ndarray::ArrayViewMut1<u32>) -> Result<(), ProtocolError> {
    let mut count = 0;
    for (i, word) in line.split_whitespace().enumerate() {
        if i >= slot.len() {
            return Err(invalid("row longer than declared"));
        }
        slot[i] = word
            .parse()
            .map_err(|_| invalid(&format!("invalid ring value {:?}", word)))?;
        count += 1;
    }
    if count != slot.len() {
        return Err(invalid("row shorter than declared"));
    }
    Ok(())
}

fn invalid(message: &str) -> ProtocolError {
    ProtocolError::Io(io::Error::new(io::ErrorKind::InvalidData, message.to_string()))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn write_then_parse_round_trips() {
        let dir = std::env::temp_dir().join("mfmpc-trace-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roundtrip.txt");

        let mut writer = TraceWriter::create(&path).unwrap();
        let query = Query {
            user: 1,
            item_share: 99,
        };
        writer.begin_query(0, &query).unwrap();
        writer
            .matrix("u", array![[1u32, 2], [3, u32::MAX]].view())
            .unwrap();
        writer.vector("one_hot", array![0u32, 1, 0].view()).unwrap();
        writer.scalar("delta", 7).unwrap();
        writer.end_query().unwrap();

        let parsed = read_trace(&path).unwrap();
        assert_eq!(parsed.len(), 1);
        let trace = &parsed[0];
        assert_eq!(trace.user, 1);
        assert_eq!(trace.item_share, 99);
        assert_eq!(trace.matrix("u").unwrap(), &array![[1u32, 2], [3, u32::MAX]]);
        assert_eq!(trace.vector("one_hot").unwrap(), &array![0u32, 1, 0]);
        assert_eq!(trace.scalar("delta"), Some(7));
    }

    #[test]
    fn rejects_short_matrix_row() {
        let text = "query 0\nuser 0\nitem_share 0\nmatrix u 1 3\n1 2\nend\n";
        assert!(parse_trace(text).is_err());
    }

    #[test]
    fn parses_multiple_queries() {
        let text = "query 0\nuser 0\nitem_share 5\nscalar delta 1\nend\n\
                    query 1\nuser 1\nitem_share 6\nscalar delta 2\nend\n";
        let parsed = parse_trace(text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].index, 1);
        assert_eq!(parsed[1].scalar("delta"), Some(2));
    }
}
