//! The JitterBuffer PLC scenario and the file transfer round-trip scenario
//! from the testable-properties list, driven through the `MeshNode` facade
//! rather than the leaf crates directly.

use std::sync::Arc;

use async_trait::async_trait;

use mesh_filetransfer::FileTransferConfig;
use mesh_handshake::MemoryStorage;
use mesh_types::{MeshResult, PeerId};
use meshnet::{MeshConfig, MeshNode};

struct NoopTransport;

#[async_trait]
impl mesh_handshake::Transport for NoopTransport {
    async fn send(&self, _peer_id: &PeerId, _bytes: Vec<u8>) -> MeshResult<()> {
        Ok(())
    }
    async fn start(&self) -> MeshResult<()> {
        Ok(())
    }
    async fn stop(&self) -> MeshResult<()> {
        Ok(())
    }
}

async fn node() -> Arc<MeshNode> {
    MeshNode::start(Arc::new(MemoryStorage::new()), Arc::new(NoopTransport), MeshConfig::default(), 1)
        .await
        .unwrap()
}

#[tokio::test]
async fn jitter_buffer_plc_scenario() {
    let node = node().await;
    let peer_id = PeerId::from_bytes(vec![1, 2, 3]);

    node.push_audio_frame(peer_id.clone(), vec![1], 0).await;
    node.push_audio_frame(peer_id.clone(), vec![3], 2).await;

    let first = node.pop_audio_frame(&peer_id).await.unwrap();
    assert_eq!(first.frame, Some(vec![1]));
    assert!(!first.is_plc);

    let second = node.pop_audio_frame(&peer_id).await.unwrap();
    assert_eq!(second.frame, None);
    assert!(second.is_plc);

    let third = node.pop_audio_frame(&peer_id).await.unwrap();
    assert_eq!(third.frame, Some(vec![3]));
    assert!(!third.is_plc);
}

#[tokio::test]
async fn file_transfer_round_trip_with_out_of_order_and_duplicate_chunks() {
    let config = MeshConfig {
        file_transfer: FileTransferConfig { chunk_size: 4096, ..Default::default() },
        ..Default::default()
    };
    let node = MeshNode::start(Arc::new(MemoryStorage::new()), Arc::new(NoopTransport), config, 1)
        .await
        .unwrap();
    let peer_id = PeerId::from_bytes(vec![9, 9, 9]);

    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let prepared = node
        .prepare_send_file(peer_id.clone(), data.clone(), "blob.bin".into(), "application/octet-stream".into())
        .unwrap();
    assert_eq!(prepared.chunks.len(), 3);
    assert_eq!(prepared.offer.chunk_size, 4096);

    let mut events = node.subscribe();

    let transfer_id = node.handle_file_offer(prepared.offer.clone(), peer_id.clone()).unwrap();
    assert_eq!(transfer_id, prepared.id);

    node.handle_file_chunk(&transfer_id, 1, prepared.chunks[1].data.clone()).unwrap();
    node.handle_file_chunk(&transfer_id, 0, prepared.chunks[0].data.clone()).unwrap();
    // Idempotent retransmit of a chunk already received.
    node.handle_file_chunk(&transfer_id, 0, prepared.chunks[0].data.clone()).unwrap();
    node.handle_file_chunk(&transfer_id, 2, prepared.chunks[2].data.clone()).unwrap();

    for chunk in &prepared.chunks {
        node.mark_file_chunk_sent(&prepared.id, chunk.index).unwrap();
    }

    let mut received = None;
    let mut send_completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            meshnet::MeshEvent::FileTransfer(mesh_filetransfer::FileTransferEvent::FileReceived { data, .. }) => {
                received = Some(data);
            }
            meshnet::MeshEvent::FileTransfer(mesh_filetransfer::FileTransferEvent::SendComplete { .. }) => {
                send_completed = true;
            }
            _ => {}
        }
    }

    assert_eq!(received.unwrap(), data);
    assert!(send_completed);
}
