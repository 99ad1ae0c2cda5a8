//! Spins up a small in-process Chord ring and checks the ring-closure
//! and key-placement invariants: ring closure (every node's successor
//! chain visits every other node exactly once) and key retrievability
//! (every key is fetchable from the node that owns it). Runs everything
//! from a single process rather than spawning child OS processes.

use std::time::Duration;

use tonic::transport::Server;
use tonic::Request;

use chord_core::chord_proto::chord_client::ChordClient;
use chord_core::chord_proto::chord_server::ChordServer;
use chord_core::chord_proto::{Empty, FindSuccessorRequest, PutRequest};
use chord_core::config::Config;
use chord_core::lifecycle;
use chord_core::maintenance;

const NODE_COUNT: usize = 5;
const BASE_PORT: u16 = 7400;
const MAINTAIN_PAUSE_MILLIS: u64 = 100;

fn config_for(port: u16, peer: Option<String>) -> Config {
    Config {
        address: format!("127.0.0.1:{}", port),
        peer,
        successor_list_len: 3,
        maintain_pause: Duration::from_millis(MAINTAIN_PAUSE_MILLIS),
        rpc_timeout: Duration::from_millis(50),
        ping_timeout: Duration::from_millis(20),
        dev_mode: true,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .ok();

    let mut addresses = Vec::new();
    let first_config = config_for(BASE_PORT, None);
    addresses.push(first_config.address.clone());
    let first_service = lifecycle::create(&first_config);
    serve(first_service.clone(), first_config.address.clone());

    for i in 1..NODE_COUNT {
        let port = BASE_PORT + i as u16;
        let peer = addresses[0].clone();
        let config = config_for(port, Some(peer.clone()));
        addresses.push(config.address.clone());
        let service = lifecycle::join(&config, &peer).await?;
        serve(service.clone(), config.address.clone());
        tokio::time::sleep(Duration::from_millis(MAINTAIN_PAUSE_MILLIS * 3)).await;
    }

    println!("waiting for the ring to stabilize...");
    tokio::time::sleep(Duration::from_millis(MAINTAIN_PAUSE_MILLIS * 20)).await;

    println!("putting 20 keys through node 0...");
    let mut client = ChordClient::connect(format!("http://{}", addresses[0])).await?;
    for i in 0..20u32 {
        let key = format!("key-{}", i).into_bytes();
        let owner = client
            .find_successor(Request::new(FindSuccessorRequest {
                id: chord_core::identifier::Identifier::of_bytes(&key).0,
            }))
            .await?
            .into_inner()
            .address;
        let mut owner_client = ChordClient::connect(format!("http://{}", owner)).await?;
        owner_client
            .put_in_store(Request::new(PutRequest {
                key: key.clone(),
                value: format!("value-{}", i).into_bytes(),
                ttl_secs: 0,
            }))
            .await?;
    }

    println!("verifying ring closure (P1) via successor chains...");
    let mut visited = std::collections::HashSet::new();
    let mut current = addresses[0].clone();
    for _ in 0..NODE_COUNT {
        if !visited.insert(current.clone()) {
            break;
        }
        let mut c = ChordClient::connect(format!("http://{}", current)).await?;
        current = c
            .first_available_successor(Request::new(Empty {}))
            .await?
            .into_inner()
            .address;
    }
    assert_eq!(visited.len(), NODE_COUNT, "ring closure did not visit every node exactly once");

    println!("verifying every key is retrievable (P3) from its owner...");
    for i in 0..20u32 {
        let key = format!("key-{}", i).into_bytes();
        let owner = client
            .find_successor(Request::new(FindSuccessorRequest {
                id: chord_core::identifier::Identifier::of_bytes(&key).0,
            }))
            .await?
            .into_inner()
            .address;
        let mut owner_client = ChordClient::connect(format!("http://{}", owner)).await?;
        let response = owner_client
            .get_in_store(Request::new(chord_core::chord_proto::GetRequest { key }))
            .await?
            .into_inner();
        assert!(response.found, "key-{} missing from its owner", i);
    }

    println!("cluster looks good!");
    Ok(())
}

fn serve(service: chord_core::ChordService, address: String) {
    for handle in maintenance::spawn_all(service.clone()) {
        tokio::spawn(async move {
            let _ = handle.await;
        });
    }
    tokio::spawn(async move {
        let addr = address.parse().expect("valid socket address");
        Server::builder()
            .add_service(ChordServer::new(service))
            .serve(addr)
            .await
            .expect("node server crashed");
    });
}
