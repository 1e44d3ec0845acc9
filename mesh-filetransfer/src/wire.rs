//! Application-level wire structs for file transfer. Derives
//! `serde::{Serialize, Deserialize}` so a host application can plug in any
//! serde-compatible codec (JSON, bincode, CBOR) — the core only produces
//! and consumes these fields, it never picks the codec.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOffer {
    #[serde(rename = "type")]
    pub kind: FileOfferKind,
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub size: u64,
    #[serde(rename = "totalChunks")]
    pub total_chunks: u32,
    #[serde(rename = "chunkSize")]
    pub chunk_size: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileOfferKind {
    #[serde(rename = "file:offer")]
    Offer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChunk {
    #[serde(rename = "type")]
    pub kind: FileChunkKind,
    #[serde(rename = "transferId")]
    pub transfer_id: String,
    pub index: u32,
    #[serde(rename = "totalChunks")]
    pub total_chunks: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FileChunkKind {
    #[serde(rename = "file:chunk")]
    Chunk,
}
