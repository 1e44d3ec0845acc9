//! The mesh's cryptographic core: a from-scratch ChaCha20-Poly1305 AEAD,
//! HKDF-SHA256, and X25519, used together by `mesh-noise` to build the
//! Noise_XX_25519_ChaChaPoly_SHA256 handshake and session.

pub mod aead;
pub mod chacha20;
pub mod hkdf;
pub mod poly1305;
pub mod x25519;
