//! The pluggable async I/O boundary. Modeled as an `async_trait` trait
//! object (`Arc<dyn Transport>`), the same shape the retrieved corpus uses
//! for swappable async backends rather than the teacher's own concrete
//! `tokio_core::io` socket handling — a mesh runs over BLE or Wi-Fi Direct
//! adapters the core itself never talks to directly.

use async_trait::async_trait;
use mesh_types::{MeshResult, PeerId};

/// Opaque byte-oriented transport. The transport does not interpret
/// framing: the first byte of a handshake payload is the message-type byte
/// (`HANDSHAKE_INIT`/`RESPONSE`/`FINAL`), a convention owned by
/// `HandshakeManager`, not by implementors of this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `bytes` to `peer_id`. Resolves once the underlying adapter has
    /// accepted the write; it does not imply delivery.
    async fn send(&self, peer_id: &PeerId, bytes: Vec<u8>) -> MeshResult<()>;

    async fn start(&self) -> MeshResult<()>;

    async fn stop(&self) -> MeshResult<()>;
}
