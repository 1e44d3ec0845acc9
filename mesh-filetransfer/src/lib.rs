//! Chunked file transfer: split/reassemble plus the per-peer manager that
//! tracks outgoing and incoming transfers with progress events and
//! timeouts.

pub mod assembler;
pub mod chunker;
pub mod config;
pub mod file_manager;
pub mod wire;

pub use assembler::Assembler;
pub use config::FileTransferConfig;
pub use file_manager::{FileManager, FileTransferEvent, PrepareSendResult, TransferDirection};
pub use wire::{FileChunk, FileChunkKind, FileOffer, FileOfferKind};
