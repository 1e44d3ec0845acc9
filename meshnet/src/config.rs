use mesh_filetransfer::FileTransferConfig;
use mesh_handshake::HandshakeConfig;
use mesh_realtime::JitterBufferConfig;

/// Aggregates every sub-component's tunables for a single [`crate::MeshNode`].
#[derive(Debug, Clone, Default)]
pub struct MeshConfig {
    pub handshake: HandshakeConfig,
    pub file_transfer: FileTransferConfig,
    pub jitter_buffer: JitterBufferConfig,
}
