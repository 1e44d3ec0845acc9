/// Tunables for [`crate::jitter_buffer::JitterBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct JitterBufferConfig {
    /// Depth at which the buffer is considered primed enough to start
    /// playback (`is_ready`).
    pub target_depth: usize,
    /// Hard cap on buffered frames; `max_depth >= target_depth`.
    pub max_depth: usize,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        JitterBufferConfig { target_depth: 3, max_depth: 10 }
    }
}
