//! Store operations, the predecessor-loss backup merge, and the donor
//! side of data transfer on join. Every call site that needs both
//! `store` and `pre_backup` locks acquires `store` first.

use tonic::Request;

use crate::chord_proto::{KeySetMsg, KvEntry, KvMapMsg, PutRequest};
use crate::error::{NodeError, NodeResult};
use crate::identifier::{within, Identifier};
use crate::node::finger_entry::{Address, FingerEntry};
use crate::node::successor_list::NIL;
use crate::service::ChordService;
use crate::store::{Key, KvStore, StoredValue};
use crate::transport;

fn to_kv_entries(store: &KvStore) -> Vec<KvEntry> {
    store
        .iter()
        .map(|(k, v)| KvEntry {
            key: k.clone(),
            value: v.value.clone(),
            expires_at: v.expires_at,
        })
        .collect()
}

fn from_kv_entries(entries: Vec<KvEntry>) -> KvStore {
    entries
        .into_iter()
        .map(|e| {
            (
                e.key,
                StoredValue {
                    value: e.value,
                    expires_at: e.expires_at,
                },
            )
        })
        .collect()
}

impl ChordService {
    /// Writes locally, then fires off a best-effort backup write to the
    /// current live successor so every `PutInStore` call replicates,
    /// regardless of whether the caller went through the driver `put`
    /// or invoked the verb directly.
    pub async fn put_in_store(&self, key: Key, value: Vec<u8>, ttl_secs: u64) {
        self.store
            .write()
            .await
            .insert(key.clone(), StoredValue::new(value.clone(), ttl_secs));

        let this = self.clone();
        tokio::spawn(async move {
            let Ok(successor) = this.first_available_successor().await else {
                return;
            };
            if successor == this.address {
                return;
            }
            if let Ok(mut client) = transport::connect_with_timeout(&successor, this.rpc_timeout).await {
                let _ = client
                    .put_in_pre_backup(Request::new(PutRequest { key, value, ttl_secs }))
                    .await;
            }
        });
    }

    pub async fn get_in_store(&self, key: &Key) -> NodeResult<StoredValue> {
        self.store.write().await.get_live(key).ok_or(NodeError::NotFound)
    }

    pub async fn delete_in_store(&self, key: &Key) -> NodeResult<()> {
        self.store
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or(NodeError::NotFound)
    }

    pub async fn put_in_pre_backup(&self, key: Key, value: Vec<u8>, ttl_secs: u64) {
        self.pre_backup
            .write()
            .await
            .insert(key, StoredValue::new(value, ttl_secs));
    }

    pub async fn delete_in_pre_backup(&self, key: &Key) -> NodeResult<()> {
        self.pre_backup
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or(NodeError::NotFound)
    }

    pub async fn erase_redundant_pre_backup(&self, keys: &[Key]) {
        self.pre_backup.write().await.erase_keys(keys.iter());
    }

    pub async fn append_pre_backup(&self, entries: KvStore) {
        self.pre_backup.write().await.merge_overwrite(entries);
    }

    pub async fn store_snapshot(&self) -> KvStore {
        self.store.read().await.clone()
    }

    /// Absorbs `pre_backup` into `store` and returns what was absorbed,
    /// so the caller can decide what (if anything) to forward.
    pub(crate) async fn merge_backup(&self) -> KvStore {
        let mut store = self.store.write().await;
        let mut pre_backup = self.pre_backup.write().await;
        let absorbed = std::mem::take(&mut *pre_backup);
        for (key, value) in absorbed.iter() {
            store.insert(key.clone(), value.clone());
        }
        absorbed
    }

    /// Forwards the just-absorbed keys to the current successor's
    /// `pre_backup`, correcting its now-stale replica. Idempotent:
    /// appending already-present keys overwrites with the same value.
    pub(crate) async fn forward_absorbed_backup(&self, absorbed: KvStore) -> NodeResult<()> {
        if absorbed.is_empty() {
            return Ok(());
        }
        let successor = self.first_available_successor().await?;
        if successor == self.address {
            return Ok(());
        }
        let mut client = transport::connect_with_timeout(&successor, self.rpc_timeout).await?;
        client
            .append_pre_backup(Request::new(KvMapMsg {
                entries: to_kv_entries(&absorbed),
            }))
            .await?;
        Ok(())
    }

    /// Pulls a fresh replica of `address`'s store into our `pre_backup`.
    pub(crate) async fn refresh_pre_backup_from(&self, address: &Address) -> NodeResult<()> {
        let mut client = transport::connect_with_timeout(address, self.rpc_timeout).await?;
        let entries = client.get_store(Request::new(crate::chord_proto::Empty {})).await?;
        *self.pre_backup.write().await = from_kv_entries(entries.into_inner().entries);
        Ok(())
    }

    /// Server-side handling of a `Notify` call: adopts `candidate` as
    /// predecessor when it's a closer fit, merges and forwards the
    /// backup, then pulls a fresh replica from the new predecessor.
    pub async fn notify(&self, candidate: Address) -> NodeResult<()> {
        let candidate_id = Identifier::of(&candidate);

        let should_adopt = {
            let predecessor = self.predecessor.read().await;
            match predecessor.as_ref() {
                None => true,
                Some(current) if current.address == candidate => false,
                Some(current) => within(candidate_id, current.id, self.pos, false),
            }
        };

        if !should_adopt {
            return Ok(());
        }

        *self.predecessor.write().await = Some(FingerEntry {
            id: candidate_id,
            address: candidate.clone(),
        });

        let absorbed = self.merge_backup().await;
        self.forward_absorbed_backup(absorbed).await?;
        self.refresh_pre_backup_from(&candidate).await?;
        Ok(())
    }

    /// Donor side of `join`: splits off every key that no longer
    /// belongs to this node now that `new_predecessor` has taken over
    /// `(old predecessor, new_predecessor]`, keeping a backup replica of
    /// what was handed off and clearing the stale backup entries on its
    /// own successor.
    pub async fn transfer_data(&self, new_predecessor: &Address) -> NodeResult<KvStore> {
        let new_pred_id = Identifier::of(new_predecessor);
        let self_id = self.pos;

        *self.pre_backup.write().await = KvStore::new();

        let moved = {
            let mut store = self.store.write().await;
            store.split_outside(|key| {
                within(Identifier::of_bytes(key), new_pred_id, self_id, true)
            })
        };

        {
            let mut pre_backup = self.pre_backup.write().await;
            for (key, value) in moved.iter() {
                pre_backup.insert(key.clone(), value.clone());
            }
        }

        if !moved.is_empty() {
            let successor = self.first_available_successor().await.unwrap_or_else(|_| NIL.to_string());
            if successor != NIL && &successor != new_predecessor {
                if let Ok(mut client) = transport::connect_with_timeout(&successor, self.rpc_timeout).await {
                    let _ = client
                        .erase_redundant_pre_backup(Request::new(KeySetMsg {
                            keys: moved.keys().cloned().collect(),
                        }))
                        .await;
                }
            }
        }

        Ok(moved)
    }
}
