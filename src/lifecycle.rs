//! `create`, `join`, the driver `put`/`get`/`delete` operations, and the
//! voluntary/forced quit paths.

use log::{info, warn};
use tonic::Request;

use crate::chord_proto::PutRequest;
use crate::config::Config;
use crate::error::{NodeError, NodeResult};
use crate::identifier::Identifier;
use crate::node::finger_entry::FingerEntry;
use crate::service::ChordService;
use crate::store::Key;
use crate::transport;

/// `create()`: bootstrap a new, single-node ring.
pub fn create(config: &Config) -> ChordService {
    info!("starting up a new ring at {}", config.address);
    ChordService::bootstrap(config)
}

/// `join(bootstrap)`: enter an existing ring through any live member.
///
/// Builds the service in an offline state, contacts `bootstrap_addr` to
/// resolve the immediate successor, pulls its successor list, transfers
/// in the keys this node now owns, and resolves every finger before
/// flipping online.
pub async fn join(config: &Config, bootstrap_addr: &str) -> NodeResult<ChordService> {
    let service = ChordService::offline(config);
    info!("joining ring through {}", bootstrap_addr);

    let self_id = service.pos;
    let successor = {
        let mut client = transport::connect_with_timeout(bootstrap_addr, config.rpc_timeout).await?;
        client
            .find_successor(Request::new(crate::chord_proto::FindSuccessorRequest {
                id: self_id.0,
            }))
            .await?
            .into_inner()
            .address
    };

    let mut successor_client = transport::connect_with_timeout(&successor, config.rpc_timeout).await?;
    let remote_list = successor_client
        .get_successor_list(Request::new(crate::chord_proto::Empty {}))
        .await?
        .into_inner()
        .addresses;
    let live_candidates = transport::filter_live(remote_list, config.ping_timeout).await;

    {
        let mut list = service.successor_list.write().await;
        list.rebuild(successor.clone(), live_candidates);
    }
    {
        let mut fingers = service.finger_table.write().await;
        fingers.set(0, successor.clone());
    }

    if successor != service.address {
        let transferred = successor_client
            .transfer_data(Request::new(crate::chord_proto::TransferDataRequest {
                new_predecessor_address: service.address.clone(),
            }))
            .await?
            .into_inner()
            .entries;

        let mut store = service.store.write().await;
        for entry in transferred {
            store.insert(
                entry.key,
                crate::store::StoredValue {
                    value: entry.value,
                    expires_at: entry.expires_at,
                },
            );
        }
    }

    for i in 1..crate::identifier::M as usize {
        let target = self_id.start(i as u32);
        match bootstrap_find_successor(bootstrap_addr, config, target).await {
            Ok(address) => {
                let mut fingers = service.finger_table.write().await;
                fingers.set(i, address);
            }
            Err(err) => {
                warn!("join: failed to resolve finger {}: {}", i, err);
            }
        }
    }

    service.set_online(true);
    info!("join complete, successor is {}", successor);
    Ok(service)
}

async fn bootstrap_find_successor(
    bootstrap_addr: &str,
    config: &Config,
    target: Identifier,
) -> NodeResult<String> {
    let mut client = transport::connect_with_timeout(bootstrap_addr, config.rpc_timeout).await?;
    let response = client
        .find_successor(Request::new(crate::chord_proto::FindSuccessorRequest {
            id: target.0,
        }))
        .await?;
    Ok(response.into_inner().address)
}

impl ChordService {
    /// Driver `put`: resolves the owner and writes there. The owner's
    /// `PutInStore` handler itself takes care of the fire-and-forget
    /// backup write to its current successor.
    pub async fn put(&self, key: Key, value: Vec<u8>, ttl_secs: u64) -> NodeResult<()> {
        if !self.is_online() {
            return Err(NodeError::Precondition("node is offline"));
        }
        let owner = self.find_successor(Identifier::of_bytes(&key)).await?;
        let mut client = transport::connect_with_timeout(&owner, self.rpc_timeout).await?;
        client
            .put_in_store(Request::new(PutRequest { key, value, ttl_secs }))
            .await?;
        Ok(())
    }

    /// Driver `get`: distinguishes "not found" (`Ok(None)`) from
    /// transport failure (`Err`) rather than collapsing both to `false`.
    pub async fn get(&self, key: Key) -> NodeResult<Option<Vec<u8>>> {
        if !self.is_online() {
            return Err(NodeError::Precondition("node is offline"));
        }
        let owner = self.find_successor(Identifier::of_bytes(&key)).await?;
        let mut client = transport::connect_with_timeout(&owner, self.rpc_timeout).await?;
        let response = client
            .get_in_store(Request::new(crate::chord_proto::GetRequest { key }))
            .await?
            .into_inner();
        Ok(response.found.then_some(response.value))
    }

    /// Driver `delete`: fails if the key was never there; otherwise the
    /// owner also propagates to its own successor's backup.
    pub async fn delete(&self, key: Key) -> NodeResult<()> {
        if !self.is_online() {
            return Err(NodeError::Precondition("node is offline"));
        }
        let owner = self.find_successor(Identifier::of_bytes(&key)).await?;
        let mut client = transport::connect_with_timeout(&owner, self.rpc_timeout).await?;
        client
            .delete_in_store(Request::new(crate::chord_proto::DeleteRequest { key }))
            .await?;
        Ok(())
    }

    /// Voluntary leave: stop serving, ask the successor to absorb our
    /// backup via `CheckPredecessor`, ask the predecessor to `Stabilize`
    /// onto a live successor, then clear local state.
    pub async fn quit(&self) -> NodeResult<()> {
        if !self.is_online() {
            return Err(NodeError::Precondition("node is already offline"));
        }

        let predecessor = self.predecessor_address().await;
        let successor = self.first_available_successor().await.ok();

        self.set_online(false);

        if let Some(successor) = &successor {
            if let Ok(mut client) = transport::connect_with_timeout(successor, self.rpc_timeout).await {
                let _ = client
                    .check_predecessor(Request::new(crate::chord_proto::Empty {}))
                    .await;
            }
        }
        if let Some(predecessor) = &predecessor {
            if let Ok(mut client) = transport::connect_with_timeout(predecessor, self.rpc_timeout).await {
                let _ = client.stabilize(Request::new(crate::chord_proto::Empty {})).await;
            }
        }

        self.clear_state().await;
        info!("{} left the ring voluntarily", self.address);
        Ok(())
    }

    /// Crash simulation: drop state without informing peers. Recovery
    /// happens purely through the maintenance loops of the rest of the
    /// ring.
    pub async fn force_quit(&self) {
        self.set_online(false);
        self.clear_state().await;
        warn!("{} force-quit (simulated crash)", self.address);
    }

    async fn clear_state(&self) {
        *self.predecessor.write().await = None;
        *self.store.write().await = Default::default();
        *self.pre_backup.write().await = Default::default();
    }
}

