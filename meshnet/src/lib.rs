//! Ties the handshake, session, file transfer, and jitter buffer crates
//! into a single mesh node facade.

pub mod config;
pub mod event;
pub mod node;

pub use config::MeshConfig;
pub use event::MeshEvent;
pub use node::MeshNode;

pub use mesh_filetransfer::{FileChunk, FileOffer, FileTransferEvent};
pub use mesh_handshake::{HandshakeEvent, MemoryStorage, Storage, Transport};
pub use mesh_realtime::{JitterBufferEvent, PopResult, PushOutcome};
pub use mesh_types::{MeshError, MeshResult, PeerId, Role};
