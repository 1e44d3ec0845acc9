use mesh_filetransfer::FileTransferEvent;
use mesh_handshake::HandshakeEvent;

/// Every event a [`crate::MeshNode`] can emit, folded into one enum so an
/// application can subscribe once rather than juggling one channel per
/// sub-component.
#[derive(Debug, Clone)]
pub enum MeshEvent {
    Handshake(HandshakeEvent),
    FileTransfer(FileTransferEvent),
}

impl From<HandshakeEvent> for MeshEvent {
    fn from(event: HandshakeEvent) -> Self {
        MeshEvent::Handshake(event)
    }
}

impl From<FileTransferEvent> for MeshEvent {
    fn from(event: FileTransferEvent) -> Self {
        MeshEvent::FileTransfer(event)
    }
}
