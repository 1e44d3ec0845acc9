//! Splits a byte buffer into fixed-size, in-order chunks for transmission.

use mesh_types::{MeshError, MeshResult};

use crate::wire::{FileChunk, FileChunkKind};

/// Splits `data` into `FileChunk`s of `chunk_size` bytes (the final chunk
/// may be shorter). Fails if `data` exceeds `max_file_size`. Empty input
/// yields zero chunks, matching an empty file being a valid (if unusual)
/// transfer.
pub fn chunk(
    data: &[u8],
    transfer_id: &str,
    chunk_size: usize,
    max_file_size: u64,
) -> MeshResult<Vec<FileChunk>> {
    if data.len() as u64 > max_file_size {
        return Err(MeshError::MessageTooLarge(format!(
            "file of {} bytes exceeds the {max_file_size}-byte limit",
            data.len()
        )));
    }
    if chunk_size == 0 {
        return Err(MeshError::InvalidConfig("chunk_size must be greater than zero".into()));
    }
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let total_chunks = data.len().div_ceil(chunk_size) as u32;
    let mut chunks = Vec::with_capacity(total_chunks as usize);

    for (index, slice) in data.chunks(chunk_size).enumerate() {
        chunks.push(FileChunk {
            kind: FileChunkKind::Chunk,
            transfer_id: transfer_id.to_string(),
            index: index as u32,
            total_chunks,
            data: slice.to_vec(),
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_exact_and_remainder_chunks() {
        let data = vec![0u8; 10_000];
        let chunks = chunk(&data, "t1", 4096, 1_000_000).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data.len(), 4096);
        assert_eq!(chunks[1].data.len(), 4096);
        assert_eq!(chunks[2].data.len(), 10_000 - 2 * 4096);
        assert!(chunks.iter().all(|c| c.total_chunks == 3));
    }

    #[test]
    fn empty_data_yields_zero_chunks() {
        let chunks = chunk(&[], "t1", 4096, 1_000_000).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn oversized_file_is_rejected() {
        let data = vec![0u8; 2_000];
        assert!(matches!(
            chunk(&data, "t1", 512, 1_000),
            Err(MeshError::MessageTooLarge(_))
        ));
    }

    #[test]
    fn chunk_indices_are_contiguous_from_zero() {
        let data = vec![1u8; 100];
        let chunks = chunk(&data, "t1", 30, 1_000).unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
