//! The post-handshake transport session: a pair of independently-nonced
//! AEAD directions. Grounded on the teacher's `CipherState` (`nonce`,
//! `secret_key`, little-endian nonce-in-the-low-bytes framing, increment
//! after every successful operation), generalized to two independent
//! directions held by one `Session` rather than the teacher's own
//! `send_cipher`/`recv_cipher` pair on `Machine`, and to an explicit 64-bit
//! big-endian nonce prefix carried on the wire instead of key rotation.

use mesh_types::{MeshError, MeshResult, Role};
use zeroize::Zeroize;

use mesh_crypto::aead;

const NONCE_PREFIX_LEN: usize = 8;

fn noise_nonce(counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// A live, bidirectional encrypted channel produced by a completed
/// [`crate::handshake_core::HandshakeCore`].
pub struct Session {
    role: Role,
    send_key: [u8; 32],
    recv_key: [u8; 32],
    send_nonce: u64,
    recv_nonce: u64,
    handshake_hash: [u8; 32],
    remote_static_public_key: [u8; 32],
    established: bool,
}

/// The pieces of a [`Session`] needed to resume it verbatim, e.g. across a
/// process restart. Every field round-trips exactly, including the nonce
/// counters — a `Session` restored from exported state continues exactly
/// where it left off rather than resetting replay protection.
#[derive(Debug, Clone)]
pub struct ExportedSessionState {
    pub role: Role,
    pub send_key: [u8; 32],
    pub recv_key: [u8; 32],
    pub send_nonce: u64,
    pub recv_nonce: u64,
    pub handshake_hash: [u8; 32],
    pub remote_static_public_key: [u8; 32],
}

impl Session {
    pub(crate) fn new(
        role: Role,
        send_key: [u8; 32],
        recv_key: [u8; 32],
        handshake_hash: [u8; 32],
        remote_static_public_key: [u8; 32],
    ) -> Self {
        Session {
            role,
            send_key,
            recv_key,
            send_nonce: 0,
            recv_nonce: 0,
            handshake_hash,
            remote_static_public_key,
            established: true,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn handshake_hash(&self) -> [u8; 32] {
        self.handshake_hash
    }

    pub fn remote_static_public_key(&self) -> [u8; 32] {
        self.remote_static_public_key
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    fn require_established(&self) -> MeshResult<()> {
        if !self.established {
            return Err(MeshError::ConnectionClosed);
        }
        Ok(())
    }

    /// Encrypts `plaintext`, returning `send_nonce (8 bytes, big-endian) ‖
    /// ciphertext ‖ tag`. Fails once the 64-bit counter has been exhausted,
    /// rather than silently wrapping and reusing a nonce.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> MeshResult<Vec<u8>> {
        self.require_established()?;
        if self.send_nonce == u64::MAX {
            return Err(MeshError::NonceExhausted);
        }

        let nonce = noise_nonce(self.send_nonce);
        let body = aead::encrypt(&self.send_key, &nonce, plaintext, &[])?;

        let mut frame = Vec::with_capacity(NONCE_PREFIX_LEN + body.len());
        frame.extend_from_slice(&self.send_nonce.to_be_bytes());
        frame.extend_from_slice(&body);

        self.send_nonce += 1;
        Ok(frame)
    }

    /// Decrypts a frame produced by the peer's `encrypt`. The nonce is read
    /// from the frame's 8-byte prefix and must match the expected
    /// `recv_nonce` exactly: any other value — a replay, a reorder, or
    /// corruption — is rejected before the AEAD tag is even checked. A
    /// verification failure leaves `recv_nonce` untouched, so a message that
    /// is later replayed still fails once the real one has been consumed.
    pub fn decrypt(&mut self, frame: &[u8]) -> MeshResult<Vec<u8>> {
        self.require_established()?;
        if frame.len() < NONCE_PREFIX_LEN {
            return Err(MeshError::MessageInvalidFormat(
                "frame shorter than the nonce prefix".into(),
            ));
        }

        let mut nonce_bytes = [0u8; 8];
        nonce_bytes.copy_from_slice(&frame[..NONCE_PREFIX_LEN]);
        let frame_nonce = u64::from_be_bytes(nonce_bytes);
        if frame_nonce != self.recv_nonce {
            return Err(MeshError::AuthTagMismatch);
        }

        let nonce = noise_nonce(self.recv_nonce);
        let plaintext = aead::decrypt(&self.recv_key, &nonce, &frame[NONCE_PREFIX_LEN..], &[])?;

        self.recv_nonce += 1;
        Ok(plaintext)
    }

    /// Zeroizes both keys and marks the session unusable. Every subsequent
    /// `encrypt`/`decrypt` call fails with `ConnectionClosed`.
    pub fn destroy(&mut self) {
        self.send_key.zeroize();
        self.recv_key.zeroize();
        self.established = false;
    }

    pub fn export_state(&self) -> ExportedSessionState {
        ExportedSessionState {
            role: self.role,
            send_key: self.send_key,
            recv_key: self.recv_key,
            send_nonce: self.send_nonce,
            recv_nonce: self.recv_nonce,
            handshake_hash: self.handshake_hash,
            remote_static_public_key: self.remote_static_public_key,
        }
    }

    pub fn import_state(state: ExportedSessionState) -> Self {
        Session {
            role: state.role,
            send_key: state.send_key,
            recv_key: state.recv_key,
            send_nonce: state.send_nonce,
            recv_nonce: state.recv_nonce,
            handshake_hash: state.handshake_hash,
            remote_static_public_key: state.remote_static_public_key,
            established: true,
        }
    }
}
