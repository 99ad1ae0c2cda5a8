//! Exercises a small real ring over loopback gRPC: join, stabilize,
//! put/get across nodes, and a voluntary quit. No mocked transport;
//! every call in this crate dials a real `ChordClient`, so this is the
//! only way to cover `lifecycle`/`service` end to end.

use std::time::Duration;

use tonic::transport::Server;

use chord_core::chord_proto::chord_server::ChordServer;
use chord_core::config::Config;
use chord_core::lifecycle;
use chord_core::maintenance;
use chord_core::ChordService;

fn test_config(port: u16, peer: Option<String>) -> Config {
    Config {
        address: format!("127.0.0.1:{}", port),
        peer,
        successor_list_len: 3,
        maintain_pause: Duration::from_millis(80),
        rpc_timeout: Duration::from_millis(50),
        ping_timeout: Duration::from_millis(20),
        dev_mode: false,
    }
}

fn serve(service: ChordService, address: String) {
    for handle in maintenance::spawn_all(service.clone()) {
        tokio::spawn(async move {
            let _ = handle.await;
        });
    }
    tokio::spawn(async move {
        let addr = address.parse().unwrap();
        Server::builder()
            .add_service(ChordServer::new(service))
            .serve(addr)
            .await
            .unwrap();
    });
}

#[tokio::test]
async fn two_node_ring_routes_and_replicates() {
    let a_config = test_config(7501, None);
    let a = lifecycle::create(&a_config);
    serve(a.clone(), a_config.address.clone());

    let b_config = test_config(7502, Some(a_config.address.clone()));
    let b = lifecycle::join(&b_config, &a_config.address).await.expect("join succeeds");
    serve(b.clone(), b_config.address.clone());

    tokio::time::sleep(Duration::from_millis(500)).await;

    a.put(b"hello".to_vec(), b"world".to_vec(), 0).await.expect("put succeeds");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let from_a = a.get(b"hello".to_vec()).await.expect("get succeeds");
    let from_b = b.get(b"hello".to_vec()).await.expect("get succeeds");
    assert_eq!(from_a, Some(b"world".to_vec()));
    assert_eq!(from_b, Some(b"world".to_vec()));

    assert!(a.get(b"missing".to_vec()).await.expect("get succeeds").is_none());
}

#[tokio::test]
async fn quit_leaves_ring_functional() {
    let a_config = test_config(7511, None);
    let a = lifecycle::create(&a_config);
    serve(a.clone(), a_config.address.clone());

    let b_config = test_config(7512, Some(a_config.address.clone()));
    let b = lifecycle::join(&b_config, &a_config.address).await.expect("join succeeds");
    serve(b.clone(), b_config.address.clone());

    tokio::time::sleep(Duration::from_millis(500)).await;

    b.put(b"k".to_vec(), b"v".to_vec(), 0).await.expect("put succeeds");
    tokio::time::sleep(Duration::from_millis(50)).await;

    b.quit().await.expect("quit succeeds");
    assert!(!b.is_online());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(a.get(b"k".to_vec()).await.expect("get succeeds"), Some(b"v".to_vec()));
}
