//! Best-effort remote invocation and liveness probing. A node dials a
//! peer by address and gets back a gRPC client; every call is bounded by
//! a transport-level timeout so a dead peer can never block a
//! maintenance loop for longer than its period.

use std::time::Duration;

use log::warn;
use tonic::transport::Channel;

use crate::chord_proto::chord_client::ChordClient;
use crate::chord_proto::Empty;
use crate::error::{NodeError, NodeResult};
use crate::node::successor_list::NIL;

/// Dials `address` over gRPC. No in-process shortcut exists: a node
/// calling itself goes through this exact path too.
pub async fn connect(address: &str) -> NodeResult<ChordClient<Channel>> {
    let endpoint = format!("http://{}", address);
    Ok(ChordClient::connect(endpoint).await?)
}

/// Liveness probe with a short timeout. Never treats the NIL address as
/// pingable.
pub async fn ping(address: &str, timeout: Duration) -> bool {
    if address == NIL {
        return false;
    }
    let probe = async {
        let mut client = connect(address).await?;
        client
            .ping(tonic::Request::new(Empty {}))
            .await
            .map_err(NodeError::from)
    };
    match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            warn!("ping to {} failed: {}", address, err);
            false
        }
        Err(_) => {
            warn!("ping to {} timed out", address);
            false
        }
    }
}

/// Connects to `address` bounding the connection attempt itself with
/// `timeout`, distinct from the per-RPC timeout applied by callers.
pub async fn connect_with_timeout(
    address: &str,
    timeout: Duration,
) -> NodeResult<ChordClient<Channel>> {
    match tokio::time::timeout(timeout, connect(address)).await {
        Ok(result) => result,
        Err(_) => Err(NodeError::Precondition("connection attempt timed out")),
    }
}

/// Pings each address in order and keeps only the ones that answer.
/// Used before folding a peer's successor list into our own so dead
/// entries are dropped rather than copied in verbatim.
pub async fn filter_live(addresses: Vec<String>, timeout: Duration) -> Vec<String> {
    let mut live = Vec::with_capacity(addresses.len());
    for address in addresses {
        if ping(&address, timeout).await {
            live.push(address);
        }
    }
    live
}
