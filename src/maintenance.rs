//! The three independent periodic tasks that keep routing and
//! replication consistent: stabilize, fix-finger and check-predecessor.
//! Each is `{ if online { step() } ; sleep(period) }` and never panics
//! on a transport error; it logs and waits for the next round to
//! repair state.

use log::{debug, warn};

use crate::service::ChordService;

pub fn spawn_all(service: ChordService) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        spawn_stabilize(service.clone()),
        spawn_fix_finger(service.clone()),
        spawn_check_predecessor(service),
    ]
}

pub fn spawn_stabilize(service: ChordService) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if service.is_online() {
                if let Err(err) = service.stabilize().await {
                    warn!("stabilize failed: {}", err);
                } else {
                    debug!("stabilize completed");
                }
            }
            tokio::time::sleep(service.maintain_pause).await;
        }
    })
}

pub fn spawn_fix_finger(service: ChordService) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if service.is_online() {
                if let Err(err) = service.fix_finger().await {
                    warn!("fix_finger failed: {}", err);
                }
            }
            tokio::time::sleep(service.maintain_pause).await;
        }
    })
}

pub fn spawn_check_predecessor(service: ChordService) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if service.is_online() {
                if let Err(err) = service.check_predecessor().await {
                    warn!("check_predecessor failed: {}", err);
                }
            }
            tokio::time::sleep(service.maintain_pause).await;
        }
    })
}
