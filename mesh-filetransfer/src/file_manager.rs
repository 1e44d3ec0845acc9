//! Orchestrates outgoing and incoming file transfers: concurrency caps,
//! progress events, and per-transfer timeouts. Mirrors the background-sweep
//! timeout pattern used by `mesh_handshake::HandshakeManager` — a single
//! periodic task scans a map of deadlined state rather than one timer task
//! per transfer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use mesh_types::{MeshError, MeshResult, PeerId};

use crate::assembler::Assembler;
use crate::chunker;
use crate::config::FileTransferConfig;
use crate::wire::{FileOffer, FileOfferKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone)]
pub enum FileTransferEvent {
    SendProgress { transfer_id: String, percent: u8 },
    SendComplete { transfer_id: String, elapsed_ms: u64 },
    ReceiveProgress { transfer_id: String, percent: u8 },
    FileReceived {
        transfer_id: String,
        name: String,
        mime_type: String,
        size: u64,
        data: Vec<u8>,
        elapsed_ms: u64,
    },
    TransferFailed { transfer_id: String, reason: String },
    Cancelled { transfer_id: String, direction: TransferDirection },
}

pub struct PrepareSendResult {
    pub id: String,
    pub offer: FileOffer,
    pub chunks: Vec<crate::wire::FileChunk>,
}

struct OutgoingTransfer {
    #[allow(dead_code)]
    peer_id: PeerId,
    total_chunks: u32,
    sent_count: u32,
    started_at: Instant,
    deadline: Instant,
}

struct IncomingTransfer {
    #[allow(dead_code)]
    sender_id: PeerId,
    name: String,
    mime_type: String,
    size: u64,
    assembler: Assembler,
    started_at: Instant,
    deadline: Instant,
}

pub struct FileManager {
    config: FileTransferConfig,
    outgoing: Mutex<HashMap<String, OutgoingTransfer>>,
    incoming: Mutex<HashMap<String, IncomingTransfer>>,
    events: broadcast::Sender<FileTransferEvent>,
}

impl FileManager {
    pub fn new(config: FileTransferConfig) -> Arc<Self> {
        let (events, _rx) = broadcast::channel(256);
        let manager = Arc::new(FileManager {
            config,
            outgoing: Mutex::new(HashMap::new()),
            incoming: Mutex::new(HashMap::new()),
            events,
        });
        manager.clone().spawn_sweeper();
        manager
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FileTransferEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: FileTransferEvent) {
        let _ = self.events.send(event);
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                self.sweep_expired();
            }
        });
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        let expired_out: Vec<String> = {
            let outgoing = self.outgoing.lock().unwrap();
            outgoing.iter().filter(|(_, t)| now >= t.deadline).map(|(id, _)| id.clone()).collect()
        };
        let expired_in: Vec<String> = {
            let incoming = self.incoming.lock().unwrap();
            incoming.iter().filter(|(_, t)| now >= t.deadline).map(|(id, _)| id.clone()).collect()
        };

        for id in expired_out {
            self.outgoing.lock().unwrap().remove(&id);
            warn!(transfer_id = %id, "outgoing transfer timed out");
            self.emit(FileTransferEvent::TransferFailed { transfer_id: id, reason: "timeout".into() });
        }
        for id in expired_in {
            self.incoming.lock().unwrap().remove(&id);
            warn!(transfer_id = %id, "incoming transfer timed out");
            self.emit(FileTransferEvent::TransferFailed { transfer_id: id, reason: "timeout".into() });
        }
    }

    /// Begins an outgoing transfer: chunks `data`, registers its deadline,
    /// and returns the offer plus the chunks the caller should now send.
    #[instrument(skip(self, data), fields(%peer_id, size = data.len()))]
    pub fn prepare_send(
        &self,
        peer_id: PeerId,
        data: Vec<u8>,
        name: String,
        mime_type: String,
    ) -> MeshResult<PrepareSendResult> {
        {
            let outgoing = self.outgoing.lock().unwrap();
            if outgoing.len() >= self.config.max_concurrent_transfers {
                return Err(MeshError::Validation(
                    "maximum concurrent outgoing transfers reached".into(),
                ));
            }
        }

        let transfer_id = Uuid::new_v4().to_string();
        let size = data.len() as u64;
        let chunks = chunker::chunk(&data, &transfer_id, self.config.chunk_size, self.config.max_file_size)?;
        let total_chunks = chunks.len() as u32;

        let offer = FileOffer {
            kind: FileOfferKind::Offer,
            id: transfer_id.clone(),
            name,
            mime_type,
            size,
            total_chunks,
            chunk_size: self.config.chunk_size as u32,
        };

        let now = Instant::now();
        self.outgoing.lock().unwrap().insert(
            transfer_id.clone(),
            OutgoingTransfer { peer_id, total_chunks, sent_count: 0, started_at: now, deadline: now + self.config.transfer_timeout },
        );

        Ok(PrepareSendResult { id: transfer_id, offer, chunks })
    }

    /// Records that chunk `index` of `transfer_id` went out, emitting
    /// progress and, on the last chunk, completion.
    pub fn mark_chunk_sent(&self, transfer_id: &str, _index: u32) -> MeshResult<()> {
        let (percent, complete, elapsed_ms) = {
            let mut outgoing = self.outgoing.lock().unwrap();
            let transfer = outgoing
                .get_mut(transfer_id)
                .ok_or_else(|| MeshError::Validation(format!("unknown outgoing transfer {transfer_id}")))?;
            transfer.sent_count += 1;
            let percent = percent_of(transfer.sent_count, transfer.total_chunks);
            let complete = transfer.sent_count >= transfer.total_chunks;
            let elapsed_ms = transfer.started_at.elapsed().as_millis() as u64;
            (percent, complete, elapsed_ms)
        };

        self.emit(FileTransferEvent::SendProgress { transfer_id: transfer_id.to_string(), percent });

        if complete {
            self.outgoing.lock().unwrap().remove(transfer_id);
            info!(transfer_id, elapsed_ms, "outgoing transfer complete");
            self.emit(FileTransferEvent::SendComplete { transfer_id: transfer_id.to_string(), elapsed_ms });
        }
        Ok(())
    }

    /// Validates an incoming offer and opens an `Assembler` for it.
    #[instrument(skip(self, offer), fields(%sender_id))]
    pub fn handle_offer(&self, offer: FileOffer, sender_id: PeerId) -> MeshResult<String> {
        if offer.id.is_empty() {
            return Err(MeshError::MessageInvalidFormat("file offer missing id".into()));
        }
        if offer.name.is_empty() {
            return Err(MeshError::MessageInvalidFormat("file offer missing name".into()));
        }
        if offer.total_chunks == 0 {
            return Err(MeshError::MessageInvalidFormat("file offer has zero chunks".into()));
        }
        if offer.size == 0 {
            return Err(MeshError::MessageInvalidFormat("file offer has zero size".into()));
        }
        if offer.size > self.config.max_file_size {
            return Err(MeshError::MessageTooLarge(format!(
                "offered file of {} bytes exceeds the {}-byte limit",
                offer.size, self.config.max_file_size
            )));
        }

        {
            let incoming = self.incoming.lock().unwrap();
            if incoming.len() >= self.config.max_concurrent_transfers {
                return Err(MeshError::Validation(
                    "maximum concurrent incoming transfers reached".into(),
                ));
            }
        }

        let now = Instant::now();
        let transfer_id = offer.id.clone();
        self.incoming.lock().unwrap().insert(
            transfer_id.clone(),
            IncomingTransfer {
                sender_id,
                name: offer.name,
                mime_type: offer.mime_type,
                size: offer.size,
                assembler: Assembler::new(transfer_id.clone(), offer.total_chunks, offer.size),
                started_at: now,
                deadline: now + self.config.transfer_timeout,
            },
        );
        Ok(transfer_id)
    }

    /// Feeds one received chunk into its transfer's assembler.
    pub fn handle_chunk(&self, transfer_id: &str, index: u32, data: Vec<u8>) -> MeshResult<()> {
        let (percent, complete) = {
            let mut incoming = self.incoming.lock().unwrap();
            let transfer = incoming
                .get_mut(transfer_id)
                .ok_or_else(|| MeshError::Validation(format!("unknown incoming transfer {transfer_id}")))?;
            transfer.assembler.add_chunk(index, data);
            let percent = percent_of(transfer.assembler.received_chunks() as u32, transfer.assembler.total_chunks());
            (percent, transfer.assembler.is_complete())
        };

        self.emit(FileTransferEvent::ReceiveProgress { transfer_id: transfer_id.to_string(), percent });

        if complete {
            let mut incoming = self.incoming.lock().unwrap();
            let mut transfer = incoming
                .remove(transfer_id)
                .ok_or_else(|| MeshError::Validation(format!("unknown incoming transfer {transfer_id}")))?;
            drop(incoming);

            let data = transfer.assembler.assemble()?;
            let elapsed_ms = transfer.started_at.elapsed().as_millis() as u64;
            info!(transfer_id, elapsed_ms, "incoming transfer complete");
            self.emit(FileTransferEvent::FileReceived {
                transfer_id: transfer_id.to_string(),
                name: std::mem::take(&mut transfer.name),
                mime_type: std::mem::take(&mut transfer.mime_type),
                size: transfer.size,
                data,
                elapsed_ms,
            });
        }
        Ok(())
    }

    /// Cancels a transfer in either direction, wherever it is found.
    pub fn cancel_transfer(&self, transfer_id: &str) -> MeshResult<()> {
        if self.outgoing.lock().unwrap().remove(transfer_id).is_some() {
            self.emit(FileTransferEvent::Cancelled {
                transfer_id: transfer_id.to_string(),
                direction: TransferDirection::Outgoing,
            });
            return Ok(());
        }
        if self.incoming.lock().unwrap().remove(transfer_id).is_some() {
            self.emit(FileTransferEvent::Cancelled {
                transfer_id: transfer_id.to_string(),
                direction: TransferDirection::Incoming,
            });
            return Ok(());
        }
        Err(MeshError::Validation(format!("unknown transfer {transfer_id}")))
    }
}

fn percent_of(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as u64 * 100) / total as u64).min(100) as u8
}
