//! `FindSuccessor`, `FirstAvailableSuccessor` and
//! `ClosestPrecedingFinger`: the three operations that make routing
//! progress on the ring.

use log::{debug, warn};
use tonic::Request;

use crate::chord_proto::{Empty, FindSuccessorRequest, NotifyRequest};
use crate::error::{NodeError, NodeResult};
use crate::identifier::{within, Identifier};
use crate::node::successor_list::NIL;
use crate::node::Address;
use crate::service::ChordService;
use crate::transport;

impl ChordService {
    /// Locates the node that owns `key_id`.
    pub async fn find_successor(&self, key_id: Identifier) -> NodeResult<Address> {
        let successor = self.first_available_successor().await?;
        let successor_id = Identifier::of(&successor);

        if within(key_id, self.pos, successor_id, true) {
            return Ok(successor);
        }

        let closest = self.closest_preceding_finger(key_id).await?;
        if closest == self.address {
            // No finger strictly precedes key_id; the best we can do is
            // our own best successor.
            return Ok(successor);
        }

        let mut client = transport::connect_with_timeout(&closest, self.rpc_timeout).await?;
        let response = client
            .find_successor(Request::new(FindSuccessorRequest { id: key_id.0 }))
            .await?;
        Ok(response.into_inner().address)
    }

    /// Scans the successor list from index 0, returning the first entry
    /// that pings. Compacts the list and schedules a delayed `Notify` on
    /// the newly promoted head when it wasn't already at index 0.
    pub async fn first_available_successor(&self) -> NodeResult<Address> {
        let candidates = self.successor_addresses().await;

        for (i, candidate) in candidates.iter().enumerate() {
            if candidate == NIL {
                continue;
            }
            if transport::ping(candidate, self.ping_timeout).await {
                if i > 0 {
                    self.promote_successor(i).await;
                }
                return Ok(candidate.clone());
            }
        }

        Err(NodeError::NoAvailableSuccessor)
    }

    async fn promote_successor(&self, live_index: usize) {
        {
            let mut list = self.successor_list.write().await;
            list.shift_left(live_index);
        }
        let new_head = self.successor_list.read().await.head().clone();
        {
            let mut fingers = self.finger_table.write().await;
            fingers.set(0, new_head.clone());
        }

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.maintain_pause * 2).await;
            if let Ok(mut client) = transport::connect_with_timeout(&new_head, this.rpc_timeout).await {
                let _ = client
                    .notify(Request::new(NotifyRequest {
                        address: this.address.clone(),
                    }))
                    .await;
            }
        });
    }

    /// Scans fingers from highest index to lowest, returning the first
    /// live one whose id lies strictly between self and `key_id`. Falls
    /// back to `first_available_successor` when none qualifies.
    pub async fn closest_preceding_finger(&self, key_id: Identifier) -> NodeResult<Address> {
        let fingers = {
            let table = self.finger_table.read().await;
            table.fingers.clone()
        };

        for finger in fingers.iter().rev() {
            if finger.address == NIL {
                continue;
            }
            if within(finger.id, self.pos, key_id, false) {
                if transport::ping(&finger.address, self.ping_timeout).await {
                    return Ok(finger.address.clone());
                } else {
                    debug!("closest_preceding_finger: skipping dead finger {}", finger.address);
                }
            }
        }

        match self.first_available_successor().await {
            Ok(addr) => Ok(addr),
            Err(err) => {
                warn!("closest_preceding_finger: no fallback successor available");
                Err(err)
            }
        }
    }

    /// `fixFinger`: install the successor of the next finger target,
    /// rotating `next` modulo M.
    pub async fn fix_finger(&self) -> NodeResult<()> {
        let finger_count = self.finger_table.read().await.fingers.len();
        let index = {
            let mut next = self.fix_finger_index.write().await;
            let current = *next;
            *next = (*next + 1) % finger_count;
            current
        };

        let target = self.pos.start(index as u32);
        let resolved = self.find_successor(target).await?;

        let mut fingers = self.finger_table.write().await;
        fingers.set(index, resolved);
        Ok(())
    }

    /// `checkPredecessor`: drops a dead predecessor, absorbing its
    /// backup into our store as in `Notify`.
    pub async fn check_predecessor(&self) -> NodeResult<()> {
        let current = self.predecessor.read().await.clone();
        let Some(predecessor) = current else {
            return Ok(());
        };

        if transport::ping(&predecessor.address, self.ping_timeout).await {
            return Ok(());
        }

        *self.predecessor.write().await = None;
        let absorbed = self.merge_backup().await;
        self.forward_absorbed_backup(absorbed).await?;
        Ok(())
    }

    /// `stabilize`: reconciles the successor pointer with the
    /// successor's own predecessor, refreshes the successor list and
    /// notifies the (possibly new) successor of our presence.
    pub async fn stabilize(&self) -> NodeResult<()> {
        let successor = self.first_available_successor().await?;
        let mut client = transport::connect_with_timeout(&successor, self.rpc_timeout).await?;

        let predecessor_of_successor = client
            .get_predecessor(Request::new(Empty {}))
            .await?
            .into_inner()
            .address;

        let successor = if let Some(candidate) = predecessor_of_successor {
            let successor_id = Identifier::of(&successor);
            let candidate_id = Identifier::of(&candidate);
            if transport::ping(&candidate, self.ping_timeout).await
                && within(candidate_id, self.pos, successor_id, false)
            {
                {
                    let mut list = self.successor_list.write().await;
                    list.set_head(candidate.clone());
                }
                {
                    let mut fingers = self.finger_table.write().await;
                    fingers.set(0, candidate.clone());
                }
                candidate
            } else {
                successor
            }
        } else {
            successor
        };

        let mut successor_client = transport::connect_with_timeout(&successor, self.rpc_timeout).await?;
        let remote_list = successor_client
            .get_successor_list(Request::new(Empty {}))
            .await?
            .into_inner()
            .addresses;
        let live_candidates = transport::filter_live(remote_list, self.ping_timeout).await;

        {
            let mut list = self.successor_list.write().await;
            list.rebuild(successor.clone(), live_candidates);
        }

        successor_client
            .notify(Request::new(NotifyRequest {
                address: self.address.clone(),
            }))
            .await?;

        Ok(())
    }
}
