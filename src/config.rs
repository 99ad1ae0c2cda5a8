//! Startup configuration. Parsed by clap from CLI flags: the successor
//! list length, maintenance pause, RPC timeout and ping timeout, plus
//! the address this node binds to and the peer it joins through.

use std::time::Duration;

use clap::Parser;

pub const DEFAULT_SUCCESSOR_LIST_LEN: usize = 8;
pub const DEFAULT_MAINTAIN_PAUSE_MILLIS: u64 = 1_000;
pub const DEFAULT_RPC_TIMEOUT_MILLIS: u64 = 500;
pub const DEFAULT_PING_TIMEOUT_MILLIS: u64 = 150;

#[derive(Parser, Debug, Clone)]
#[command(name = "chord-node", about = "A Chord DHT node")]
pub struct Cli {
    /// Address this node's gRPC service binds to and advertises to peers.
    #[arg(long)]
    pub address: String,

    /// Address of an existing node to join through. Omit to bootstrap a
    /// new, single-node ring.
    #[arg(long)]
    pub peer: Option<String>,

    /// Number of consecutive successors tracked in the successor list.
    #[arg(long, default_value_t = DEFAULT_SUCCESSOR_LIST_LEN)]
    pub successor_list_len: usize,

    #[arg(long, default_value_t = DEFAULT_MAINTAIN_PAUSE_MILLIS)]
    pub maintain_pause_millis: u64,

    #[arg(long, default_value_t = DEFAULT_RPC_TIMEOUT_MILLIS)]
    pub rpc_timeout_millis: u64,

    #[arg(long, default_value_t = DEFAULT_PING_TIMEOUT_MILLIS)]
    pub ping_timeout_millis: u64,

    /// Enables the debug/introspection RPCs used by cluster-validation
    /// tooling (GetNodeSummary, GetKvStoreSize). GetStore is always
    /// served since Notify depends on it for backup refresh.
    #[arg(long, default_value_t = false)]
    pub dev_mode: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub address: String,
    pub peer: Option<String>,
    pub successor_list_len: usize,
    pub maintain_pause: Duration,
    pub rpc_timeout: Duration,
    pub ping_timeout: Duration,
    pub dev_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            address: "127.0.0.1:9000".to_string(),
            peer: None,
            successor_list_len: DEFAULT_SUCCESSOR_LIST_LEN,
            maintain_pause_millis: DEFAULT_MAINTAIN_PAUSE_MILLIS,
            rpc_timeout_millis: DEFAULT_RPC_TIMEOUT_MILLIS,
            ping_timeout_millis: DEFAULT_PING_TIMEOUT_MILLIS,
            dev_mode: false,
        }
    }

    #[test]
    fn defaults_convert_cleanly() {
        let config: Config = base_cli().into();
        assert_eq!(config.successor_list_len, DEFAULT_SUCCESSOR_LIST_LEN);
        assert_eq!(config.maintain_pause, Duration::from_millis(DEFAULT_MAINTAIN_PAUSE_MILLIS));
    }

    #[test]
    #[should_panic(expected = "ping timeout must not exceed rpc timeout")]
    fn ping_timeout_above_rpc_timeout_panics() {
        let mut cli = base_cli();
        cli.ping_timeout_millis = cli.rpc_timeout_millis + 1;
        let _: Config = cli.into();
    }

    #[test]
    #[should_panic(expected = "rpc timeout must be well under the maintenance period")]
    fn rpc_timeout_at_or_above_maintain_pause_panics() {
        let mut cli = base_cli();
        cli.rpc_timeout_millis = cli.maintain_pause_millis;
        let _: Config = cli.into();
    }

    #[test]
    #[should_panic(expected = "successor list must hold at least one entry")]
    fn empty_successor_list_panics() {
        let mut cli = base_cli();
        cli.successor_list_len = 0;
        let _: Config = cli.into();
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        assert!(
            cli.ping_timeout_millis <= cli.rpc_timeout_millis,
            "ping timeout must not exceed rpc timeout"
        );
        assert!(
            cli.rpc_timeout_millis < cli.maintain_pause_millis,
            "rpc timeout must be well under the maintenance period"
        );
        assert!(cli.successor_list_len >= 1, "successor list must hold at least one entry");
        Config {
            address: cli.address,
            peer: cli.peer,
            successor_list_len: cli.successor_list_len,
            maintain_pause: Duration::from_millis(cli.maintain_pause_millis),
            rpc_timeout: Duration::from_millis(cli.rpc_timeout_millis),
            ping_timeout: Duration::from_millis(cli.ping_timeout_millis),
            dev_mode: cli.dev_mode,
        }
    }
}
