use std::time::Duration;

/// Tunables for [`crate::file_manager::FileManager`].
#[derive(Debug, Clone, Copy)]
pub struct FileTransferConfig {
    pub chunk_size: usize,
    pub max_file_size: u64,
    pub max_concurrent_transfers: usize,
    pub transfer_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for FileTransferConfig {
    fn default() -> Self {
        FileTransferConfig {
            chunk_size: 16 * 1024,
            max_file_size: 100 * 1024 * 1024,
            max_concurrent_transfers: 4,
            transfer_timeout: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(1),
        }
    }
}
