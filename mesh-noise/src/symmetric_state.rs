//! The Noise `SymmetricState`: the running handshake hash `h`, chaining key
//! `ck`, and the one-directional cipher key `k`/`n` used while the handshake
//! itself is still being authenticated. Grounded on the teacher's own
//! `SymmetricState` (`mix_key`/`mix_hash`/`encrypt_and_hash`/`decrypt_and_hash`/
//! `initialize_symmetric`), generalized from its BOLT8-specific protocol name
//! to the generic Noise initialization rule (pad-or-hash) and from its
//! external `hkdf`/`chacha20_poly1305_aead` crates to this workspace's own
//! `mesh_crypto`.

use mesh_types::{MeshError, MeshResult};
use sha2::{Digest, Sha256};

use mesh_crypto::aead;
use mesh_crypto::hkdf;

pub const PROTOCOL_NAME: &str = "Noise_XX_25519_ChaChaPoly_SHA256";

#[derive(Clone)]
pub struct SymmetricState {
    h: [u8; 32],
    ck: [u8; 32],
    k: Option<[u8; 32]>,
    n: u64,
}

fn nonce_bytes(n: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[4..].copy_from_slice(&n.to_le_bytes());
    nonce
}

impl SymmetricState {
    /// Initializes from a protocol name: the name itself if it fits in 32
    /// bytes (zero-padded), else its SHA-256 digest. `ck` starts equal to
    /// `h`; `k` is unset until the first `MixKey`.
    pub fn initialize(protocol_name: &str) -> Self {
        let name_bytes = protocol_name.as_bytes();
        let h = if name_bytes.len() <= 32 {
            let mut padded = [0u8; 32];
            padded[..name_bytes.len()].copy_from_slice(name_bytes);
            padded
        } else {
            Sha256::digest(name_bytes).into()
        };

        SymmetricState { h, ck: h, k: None, n: 0 }
    }

    pub fn handshake_hash(&self) -> [u8; 32] {
        self.h
    }

    pub fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.h);
        hasher.update(data);
        self.h = hasher.finalize().into();
    }

    /// `(ck, k) = HKDF(ck, input, 2x32)`; resets the nonce counter.
    pub fn mix_key(&mut self, input: &[u8]) -> MeshResult<()> {
        let parts = hkdf::derive_multiple(input, &self.ck, b"", &[32, 32])?;
        self.ck.copy_from_slice(&parts[0]);
        let mut k = [0u8; 32];
        k.copy_from_slice(&parts[1]);
        self.k = Some(k);
        self.n = 0;
        Ok(())
    }

    /// Encrypts `plaintext` under the running key (if one is set — before
    /// the first `MixKey` this is the identity), mixes the resulting bytes
    /// into `h`, and returns them.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> MeshResult<Vec<u8>> {
        let out = match self.k {
            Some(k) => {
                let nonce = nonce_bytes(self.n);
                let c = aead::encrypt(&k, &nonce, plaintext, &self.h)?;
                self.n += 1;
                c
            }
            None => plaintext.to_vec(),
        };
        self.mix_hash(&out);
        Ok(out)
    }

    /// Decrypts `ciphertext` under the running key, mixing the *ciphertext*
    /// bytes into `h` regardless of outcome (matching Noise's rule of
    /// hashing the wire bytes, not the recovered plaintext).
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> MeshResult<Vec<u8>> {
        let result = match self.k {
            Some(k) => {
                let nonce = nonce_bytes(self.n);
                let p = aead::decrypt(&k, &nonce, ciphertext, &self.h);
                self.n += 1;
                p
            }
            None => Ok(ciphertext.to_vec()),
        };
        self.mix_hash(ciphertext);
        result
    }

    /// `Split() -> (k1, k2)`, the two session keys handed to the two
    /// communication directions. Fails if no key has ever been mixed in,
    /// since an un-keyed handshake cannot have authenticated anything.
    pub fn split(&self) -> MeshResult<([u8; 32], [u8; 32])> {
        if self.k.is_none() {
            return Err(MeshError::HandshakeInvalidState(
                "split requested before any key material was mixed in".into(),
            ));
        }
        let parts = hkdf::derive_multiple(b"", &self.ck, b"", &[32, 32])?;
        let mut k1 = [0u8; 32];
        let mut k2 = [0u8; 32];
        k1.copy_from_slice(&parts[0]);
        k2.copy_from_slice(&parts[1]);
        Ok((k1, k2))
    }
}
