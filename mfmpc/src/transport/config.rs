use std::{
    fs::File,
    io::{self, BufReader},
    net::SocketAddr,
    path::Path,
};

use serde::Deserialize;

/// Addresses of the three protocol processes, loaded from a JSON file shared
/// by all of them:
///
/// ```json
/// { "dealer": "127.0.0.1:9002", "parties": ["127.0.0.1:9000", "127.0.0.1:9001"] }
/// ```
///
/// The dealer listens on its address; party 1 listens on its own address for
/// party 0; party 0's address is informational.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    pub dealer: SocketAddr,
    pub parties: [SocketAddr; 2],
}

impl NetworkConfig {
    /// Load configuration from JSON file.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_json() {
        let raw = r#"{ "dealer": "127.0.0.1:9002", "parties": ["127.0.0.1:9000", "127.0.0.1:9001"] }"#;
        let config: NetworkConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.dealer.port(), 9002);
        assert_eq!(config.parties[1].port(), 9001);
    }
}
