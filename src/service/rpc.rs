//! The `Chord` gRPC trait implementation: each handler is a thin
//! wrapper that maps a request message onto a `ChordService` method and
//! a `NodeError` onto the `tonic::Status` the caller sees.

use log::debug;
use tonic::{Request, Response, Status};

use crate::chord_proto::chord_server::Chord;
use crate::chord_proto::{
    AddressMsg, DeleteRequest, DeleteResponse, Empty, FindSuccessorRequest, FingerEntryMsg,
    GetKvStoreSizeResponse, GetPredecessorResponse, GetRequest, GetResponse,
    GetStoreResponse, GetSuccessorListResponse, KeySetMsg, KvEntry, KvMapMsg, NodeSummaryMsg,
    NotifyRequest, PutRequest, SetPredecessorRequest, TransferDataRequest, TransferDataResponse,
};
use crate::identifier::Identifier;
use crate::node::finger_entry::FingerEntry;
use crate::service::ChordService;
use crate::store::{Key, StoredValue};

const DEV_MODE_DISABLED: &str = "debug RPCs require --dev-mode";

fn key_from_bytes(bytes: Vec<u8>) -> Key {
    bytes
}

/// A node that has quit or crashed must stop answering every verb,
/// `Ping` included, so peers' liveness checks actually observe it as
/// gone and promote around it instead of treating it as still live.
fn ensure_online(service: &ChordService) -> Result<(), Status> {
    if service.is_online() {
        Ok(())
    } else {
        Err(Status::unavailable("node is offline"))
    }
}

#[tonic::async_trait]
impl Chord for ChordService {
    async fn find_successor(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<AddressMsg>, Status> {
        ensure_online(self)?;
        let key_id = Identifier(request.into_inner().id);
        let address = self.find_successor(key_id).await?;
        debug!("find_successor({}) -> {}", key_id, address);
        Ok(Response::new(AddressMsg { address }))
    }

    async fn first_available_successor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<AddressMsg>, Status> {
        ensure_online(self)?;
        let address = self.first_available_successor().await?;
        Ok(Response::new(AddressMsg { address }))
    }

    async fn closest_preceding_finger(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<AddressMsg>, Status> {
        ensure_online(self)?;
        let key_id = Identifier(request.into_inner().id);
        let address = self.closest_preceding_finger(key_id).await?;
        Ok(Response::new(AddressMsg { address }))
    }

    async fn get_predecessor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        ensure_online(self)?;
        let address = self.predecessor_address().await;
        Ok(Response::new(GetPredecessorResponse { address }))
    }

    async fn set_predecessor(
        &self,
        request: Request<SetPredecessorRequest>,
    ) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        let address = request.into_inner().address;
        let id = Identifier::of(&address);
        *self.predecessor.write().await = Some(FingerEntry { id, address });
        Ok(Response::new(Empty {}))
    }

    async fn get_successor_list(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<GetSuccessorListResponse>, Status> {
        ensure_online(self)?;
        Ok(Response::new(GetSuccessorListResponse {
            addresses: self.successor_addresses().await,
        }))
    }

    async fn notify(&self, request: Request<NotifyRequest>) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        let candidate = request.into_inner().address;
        self.notify(candidate).await?;
        Ok(Response::new(Empty {}))
    }

    async fn stabilize(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        self.stabilize().await?;
        Ok(Response::new(Empty {}))
    }

    async fn check_predecessor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        self.check_predecessor().await?;
        Ok(Response::new(Empty {}))
    }

    async fn ping(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        Ok(Response::new(Empty {}))
    }

    async fn transfer_data(
        &self,
        request: Request<TransferDataRequest>,
    ) -> Result<Response<TransferDataResponse>, Status> {
        ensure_online(self)?;
        let new_predecessor = request.into_inner().new_predecessor_address;
        let moved = self.transfer_data(&new_predecessor).await?;
        let entries = moved
            .iter()
            .map(|(k, v)| KvEntry {
                key: k.clone(),
                value: v.value.clone(),
                expires_at: v.expires_at,
            })
            .collect();
        Ok(Response::new(TransferDataResponse { entries }))
    }

    async fn erase_redundant_pre_backup(
        &self,
        request: Request<KeySetMsg>,
    ) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        let keys: Vec<Key> = request.into_inner().keys;
        self.erase_redundant_pre_backup(&keys).await;
        Ok(Response::new(Empty {}))
    }

    async fn append_pre_backup(
        &self,
        request: Request<KvMapMsg>,
    ) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        let entries = request.into_inner().entries;
        let store = entries
            .into_iter()
            .map(|e| {
                (
                    key_from_bytes(e.key),
                    StoredValue {
                        value: e.value,
                        expires_at: e.expires_at,
                    },
                )
            })
            .collect();
        self.append_pre_backup(store).await;
        Ok(Response::new(Empty {}))
    }

    /// Writes locally, then fires off a best-effort `PutInPreBackup` to
    /// the current live successor so the replica stays in sync even
    /// when callers write through this verb directly rather than
    /// through the higher-level driver `put`.
    async fn put_in_store(&self, request: Request<PutRequest>) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        let req = request.into_inner();
        self.put_in_store(req.key, req.value, req.ttl_secs).await;
        Ok(Response::new(Empty {}))
    }

    async fn get_in_store(
        &self,
        request: Request<GetRequest>,
    ) -> Result<Response<GetResponse>, Status> {
        ensure_online(self)?;
        let key = request.into_inner().key;
        match self.get_in_store(&key).await {
            Ok(value) => Ok(Response::new(GetResponse {
                found: true,
                value: value.value,
            })),
            Err(_) => Ok(Response::new(GetResponse {
                found: false,
                value: Vec::new(),
            })),
        }
    }

    /// Deletes locally, then propagates to the current successor's
    /// backup; a propagation failure is reported to the caller even
    /// though the local delete already took effect, per the delete
    /// contract's stronger guarantee than `put`'s fire-and-forget.
    async fn delete_in_store(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        ensure_online(self)?;
        let key = request.into_inner().key;
        self.delete_in_store(&key).await?;

        let successor = self.first_available_successor().await?;
        if successor != self.address {
            let mut client =
                crate::transport::connect_with_timeout(&successor, self.rpc_timeout).await?;
            client
                .delete_in_pre_backup(Request::new(DeleteRequest { key }))
                .await?;
        }
        Ok(Response::new(DeleteResponse { found: true }))
    }

    async fn put_in_pre_backup(
        &self,
        request: Request<PutRequest>,
    ) -> Result<Response<Empty>, Status> {
        ensure_online(self)?;
        let req = request.into_inner();
        self.put_in_pre_backup(req.key, req.value, req.ttl_secs).await;
        Ok(Response::new(Empty {}))
    }

    async fn delete_in_pre_backup(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        ensure_online(self)?;
        let key = request.into_inner().key;
        self.delete_in_pre_backup(&key).await?;
        Ok(Response::new(DeleteResponse { found: true }))
    }

    async fn get_node_summary(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<NodeSummaryMsg>, Status> {
        ensure_online(self)?;
        if !self.dev_mode {
            return Err(Status::unimplemented(DEV_MODE_DISABLED));
        }
        let predecessor = self.predecessor_address().await;
        let successor_list = self.successor_addresses().await;
        let finger_entries = {
            let table = self.finger_table.read().await;
            table
                .fingers
                .iter()
                .map(|f| FingerEntryMsg {
                    id: f.id.0,
                    address: f.address.clone(),
                })
                .collect()
        };
        Ok(Response::new(NodeSummaryMsg {
            address: self.address.clone(),
            id: self.pos.0,
            predecessor,
            successor_list,
            finger_entries,
        }))
    }

    async fn get_kv_store_size(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<GetKvStoreSizeResponse>, Status> {
        ensure_online(self)?;
        if !self.dev_mode {
            return Err(Status::unimplemented(DEV_MODE_DISABLED));
        }
        let size = self.store.read().await.len() as u32;
        Ok(Response::new(GetKvStoreSizeResponse { size }))
    }

    /// Unlike the other debug RPCs this one is always served regardless
    /// of `dev_mode`: `Notify` relies on it to pull a fresh backup
    /// replica from the new predecessor, so gating it would break
    /// stabilization. Still refused once the node has gone offline.
    async fn get_store(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<GetStoreResponse>, Status> {
        ensure_online(self)?;
        let snapshot = self.store_snapshot().await;
        let entries = snapshot
            .iter()
            .map(|(k, v)| KvEntry {
                key: k.clone(),
                value: v.value.clone(),
                expires_at: v.expires_at,
            })
            .collect();
        Ok(Response::new(GetStoreResponse { entries }))
    }
}
