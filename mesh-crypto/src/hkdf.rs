//! HKDF-SHA256 (RFC 5869), built directly on top of a from-scratch
//! HMAC-SHA256 rather than a crate: extract-then-expand over HMAC, with the
//! [`derive_multiple`] helper the Noise `SymmetricState` (`MixKey`/`Split`)
//! relies on to split one expansion into several same-length outputs.

use mesh_types::{MeshError, MeshResult};
use sha2::{Digest, Sha256};

const HASH_LEN: usize = 32;
const BLOCK_LEN: usize = 64;
const MAX_EXPAND_LEN: usize = 255 * HASH_LEN;

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; HASH_LEN] {
    let mut block_key = [0u8; BLOCK_LEN];
    if key.len() > BLOCK_LEN {
        let hashed = Sha256::digest(key);
        block_key[..HASH_LEN].copy_from_slice(&hashed);
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let mut ipad = [0x36u8; BLOCK_LEN];
    let mut opad = [0x5cu8; BLOCK_LEN];
    for i in 0..BLOCK_LEN {
        ipad[i] ^= block_key[i];
        opad[i] ^= block_key[i];
    }

    let mut inner = Sha256::new();
    inner.update(ipad);
    inner.update(data);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(opad);
    outer.update(inner_hash);
    outer.finalize().into()
}

/// `extract(salt, ikm) -> prk`. An empty/absent salt is treated as 32 zero
/// bytes, per RFC 5869 §2.2.
pub fn extract(salt: &[u8], ikm: &[u8]) -> [u8; HASH_LEN] {
    if salt.is_empty() {
        hmac_sha256(&[0u8; HASH_LEN], ikm)
    } else {
        hmac_sha256(salt, ikm)
    }
}

/// `expand(prk, info, length) -> okm`. Fails if `length` exceeds `255 * 32`
/// bytes, the RFC 5869 hard limit for HMAC-SHA256-based HKDF.
pub fn expand(prk: &[u8], info: &[u8], length: usize) -> MeshResult<Vec<u8>> {
    if length > MAX_EXPAND_LEN {
        return Err(MeshError::Validation(format!(
            "HKDF expand length {length} exceeds the {MAX_EXPAND_LEN}-byte maximum"
        )));
    }

    let mut okm = Vec::with_capacity(length);
    let mut previous: Vec<u8> = Vec::new();
    let mut counter: u8 = 1;

    while okm.len() < length {
        let mut data = Vec::with_capacity(previous.len() + info.len() + 1);
        data.extend_from_slice(&previous);
        data.extend_from_slice(info);
        data.push(counter);

        let t = hmac_sha256(prk, &data);
        okm.extend_from_slice(&t);
        previous = t.to_vec();
        counter = counter.checked_add(1).expect("HKDF counter overflow before length limit");
    }

    okm.truncate(length);
    Ok(okm)
}

/// `derive(ikm, salt, info, length)` — the extract-then-expand composition.
pub fn derive(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> MeshResult<Vec<u8>> {
    let prk = extract(salt, ikm);
    expand(&prk, info, length)
}

/// Runs a single expansion of `sum(lengths)` bytes and splits it back into
/// the requested per-output lengths, the way Noise's `MixKey`/`Split` need
/// two 32-byte outputs from one HKDF call rather than two independent ones.
pub fn derive_multiple(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    lengths: &[usize],
) -> MeshResult<Vec<Vec<u8>>> {
    let total: usize = lengths.iter().sum();
    let okm = derive(ikm, salt, info, total)?;

    let mut parts = Vec::with_capacity(lengths.len());
    let mut offset = 0;
    for &len in lengths {
        parts.push(okm[offset..offset + len].to_vec());
        offset += len;
    }
    Ok(parts)
}
