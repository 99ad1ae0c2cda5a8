pub mod config;
pub mod error;
pub mod identifier;
pub mod lifecycle;
pub mod maintenance;
pub mod node;
pub mod service;
pub mod store;
pub mod transport;

pub mod chord_proto {
    tonic::include_proto!("chord");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("chord_descriptor");
}

pub use service::ChordService;
