use rand::Rng;
use uuid::Uuid;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4000;

/// Runtime settings of one node, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Identity stamped on every published message.
    pub node_id: String,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup.
    ///
    /// `HOST`, `PORT`, `NODE_ID`; `GENERATE_PEER_PORT=true` picks a random
    /// port just above the default so several peers can run side by side.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = if lookup("GENERATE_PEER_PORT").as_deref() == Some("true") {
            DEFAULT_PORT + rand::thread_rng().gen_range(1..=100)
        } else {
            lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT)
        };

        let node_id = lookup("NODE_ID")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            host,
            port,
            node_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = NodeConfig::from_lookup(lookup_from(&[]));
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(Uuid::parse_str(&cfg.node_id).is_ok());
    }

    #[test]
    fn reads_explicit_values() {
        let cfg = NodeConfig::from_lookup(lookup_from(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "5001"),
            ("NODE_ID", "node-7"),
        ]));
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 5001);
        assert_eq!(cfg.node_id, "node-7");
    }

    #[test]
    fn bad_port_falls_back_to_default() {
        let cfg = NodeConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn generated_peer_port_is_above_default() {
        let cfg = NodeConfig::from_lookup(lookup_from(&[("GENERATE_PEER_PORT", "true")]));
        assert!(cfg.port > DEFAULT_PORT && cfg.port <= DEFAULT_PORT + 100);
    }

    #[test]
    fn separate_nodes_get_distinct_ids() {
        let a = NodeConfig::from_lookup(lookup_from(&[]));
        let b = NodeConfig::from_lookup(lookup_from(&[]));
        assert_ne!(a.node_id, b.node_id);
    }
}
