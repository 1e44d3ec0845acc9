//! Reassembles a file from out-of-order, possibly-duplicated chunks.

use std::collections::HashMap;

use mesh_types::{MeshError, MeshResult};

pub struct Assembler {
    transfer_id: String,
    total_chunks: u32,
    total_size: u64,
    chunks: HashMap<u32, Vec<u8>>,
    received_bytes: u64,
}

impl Assembler {
    pub fn new(transfer_id: impl Into<String>, total_chunks: u32, total_size: u64) -> Self {
        Assembler {
            transfer_id: transfer_id.into(),
            total_chunks,
            total_size,
            chunks: HashMap::new(),
            received_bytes: 0,
        }
    }

    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn received_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Stores `data` at `index`. Returns `true` iff the chunk is both
    /// in-range (`0 <= index < total_chunks`) and new; duplicates and
    /// out-of-range indices are silently rejected (idempotent retransmits).
    pub fn add_chunk(&mut self, index: u32, data: Vec<u8>) -> bool {
        if index >= self.total_chunks {
            return false;
        }
        if self.chunks.contains_key(&index) {
            return false;
        }
        self.received_bytes += data.len() as u64;
        self.chunks.insert(index, data);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.len() as u32 == self.total_chunks
    }

    /// Concatenates all chunks by index order, consuming them. Fails if the
    /// transfer is not yet complete.
    pub fn assemble(&mut self) -> MeshResult<Vec<u8>> {
        if !self.is_complete() {
            return Err(MeshError::Validation(format!(
                "transfer {} incomplete: {}/{} chunks received",
                self.transfer_id,
                self.chunks.len(),
                self.total_chunks
            )));
        }

        let mut out = Vec::with_capacity(self.total_size as usize);
        for index in 0..self.total_chunks {
            let chunk = self.chunks.remove(&index).expect("is_complete guarantees every index is present");
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_out_of_order_chunks() {
        let mut assembler = Assembler::new("t1", 3, 9);
        assert!(assembler.add_chunk(2, vec![7, 8, 9]));
        assert!(assembler.add_chunk(0, vec![1, 2, 3]));
        assert!(assembler.add_chunk(1, vec![4, 5, 6]));

        assert!(assembler.is_complete());
        assert_eq!(assembler.assemble().unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn duplicate_chunk_is_rejected_and_idempotent() {
        let mut assembler = Assembler::new("t1", 2, 6);
        assert!(assembler.add_chunk(0, vec![1, 2, 3]));
        assert!(!assembler.add_chunk(0, vec![9, 9, 9]));
        assert!(assembler.add_chunk(1, vec![4, 5, 6]));
        assert_eq!(assembler.assemble().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut assembler = Assembler::new("t1", 2, 6);
        assert!(!assembler.add_chunk(5, vec![1]));
        assert!(!assembler.is_complete());
    }

    #[test]
    fn assemble_fails_before_completion() {
        let mut assembler = Assembler::new("t1", 2, 6);
        assembler.add_chunk(0, vec![1, 2, 3]);
        assert!(assembler.assemble().is_err());
    }
}
