//! The node: routing state, the primary store and its backup, wired up
//! behind the `Chord` gRPC trait. Each field is its own lock, so a
//! routing read never blocks a store write; the struct is cheap to
//! clone since every field is an `Arc`.

pub mod replication;
pub mod routing;
pub mod rpc;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::identifier::Identifier;
use crate::node::{Address, FingerEntry, FingerTable, SuccessorList};
use crate::store::KvStore;

#[derive(Clone)]
pub struct ChordService {
    /// This node's own gRPC address.
    pub(crate) address: Address,
    /// This node's position on the ring.
    pub(crate) pos: Identifier,

    pub(crate) predecessor: Arc<RwLock<Option<FingerEntry>>>,
    pub(crate) successor_list: Arc<RwLock<SuccessorList>>,
    pub(crate) finger_table: Arc<RwLock<FingerTable>>,
    pub(crate) fix_finger_index: Arc<RwLock<usize>>,

    pub(crate) store: Arc<RwLock<KvStore>>,
    pub(crate) pre_backup: Arc<RwLock<KvStore>>,

    /// Cleared exactly once per lifecycle by `quit`/`force_quit`.
    pub(crate) online: Arc<std::sync::atomic::AtomicBool>,

    pub(crate) successor_list_len: usize,
    pub(crate) rpc_timeout: Duration,
    pub(crate) ping_timeout: Duration,
    pub(crate) maintain_pause: Duration,
    pub(crate) dev_mode: bool,
}

impl ChordService {
    /// `create()`: bootstrap a singleton ring.
    pub fn bootstrap(config: &Config) -> ChordService {
        let address = config.address.clone();
        let pos = Identifier::of(&address);
        let finger_table = FingerTable::new(&address);
        let successor_list = SuccessorList::new(config.successor_list_len, address.clone());

        ChordService {
            address: address.clone(),
            pos,
            predecessor: Arc::new(RwLock::new(Some(FingerEntry::new(address)))),
            successor_list: Arc::new(RwLock::new(successor_list)),
            finger_table: Arc::new(RwLock::new(finger_table)),
            fix_finger_index: Arc::new(RwLock::new(0)),
            store: Arc::new(RwLock::new(KvStore::new())),
            pre_backup: Arc::new(RwLock::new(KvStore::new())),
            online: Arc::new(std::sync::atomic::AtomicBool::new(true)),
            successor_list_len: config.successor_list_len,
            rpc_timeout: config.rpc_timeout,
            ping_timeout: config.ping_timeout,
            maintain_pause: config.maintain_pause,
            dev_mode: config.dev_mode,
        }
    }

    /// An offline shell used while `join()` is still contacting the
    /// bootstrap peer; `online` flips to true once join completes.
    pub fn offline(config: &Config) -> ChordService {
        let address = config.address.clone();
        let pos = Identifier::of(&address);
        ChordService {
            address: address.clone(),
            pos,
            predecessor: Arc::new(RwLock::new(None)),
            successor_list: Arc::new(RwLock::new(SuccessorList::new(
                config.successor_list_len,
                address.clone(),
            ))),
            finger_table: Arc::new(RwLock::new(FingerTable::new(&address))),
            fix_finger_index: Arc::new(RwLock::new(0)),
            store: Arc::new(RwLock::new(KvStore::new())),
            pre_backup: Arc::new(RwLock::new(KvStore::new())),
            online: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            successor_list_len: config.successor_list_len,
            rpc_timeout: config.rpc_timeout,
            ping_timeout: config.ping_timeout,
            maintain_pause: config.maintain_pause,
            dev_mode: config.dev_mode,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn pos(&self) -> Identifier {
        self.pos
    }

    pub fn is_online(&self) -> bool {
        self.online.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub(crate) fn set_online(&self, value: bool) {
        self.online.store(value, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn successor_addresses(&self) -> Vec<Address> {
        self.successor_list.read().await.as_slice().to_vec()
    }

    pub async fn predecessor_address(&self) -> Option<Address> {
        self.predecessor.read().await.as_ref().map(|e| e.address.clone())
    }
}
