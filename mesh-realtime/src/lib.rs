//! Jitter-buffered delivery for real-time audio frames.

pub mod config;
pub mod jitter_buffer;

pub use config::JitterBufferConfig;
pub use jitter_buffer::{JitterBuffer, JitterBufferEvent, JitterBufferStats, PopResult, PushOutcome};
