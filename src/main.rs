use std::error::Error;

use clap::Parser;
use log::{info, LevelFilter};
use tonic::transport::Server;

use chord_core::chord_proto::chord_server::ChordServer;
use chord_core::chord_proto::FILE_DESCRIPTOR_SET;
use chord_core::config::{Cli, Config};
use chord_core::{lifecycle, maintenance};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    simple_logger::SimpleLogger::new()
        .env()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    let config: Config = cli.into();

    let service = match &config.peer {
        Some(peer_addr) => {
            info!("joining existing ring via {}", peer_addr);
            lifecycle::join(&config, peer_addr).await?
        }
        None => {
            info!("bootstrapping a new ring");
            lifecycle::create(&config)
        }
    };

    for handle in maintenance::spawn_all(service.clone()) {
        // Each loop already swallows its own transport errors and retries
        // next round, so the only way `handle` resolves is a genuine panic.
        tokio::spawn(async move {
            let _ = handle.await;
        });
    }

    info!("starting gRPC service on {}", config.address);
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build()?;

    Server::builder()
        .add_service(ChordServer::new(service))
        .add_service(reflection_service)
        .serve(config.address.parse()?)
        .await?;

    Ok(())
}
