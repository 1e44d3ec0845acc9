//! AEAD_CHACHA20_POLY1305 per RFC 8439 §2.8: ChaCha20 for confidentiality,
//! Poly1305 for integrity, composed exactly as the RFC's construction
//! describes — the Poly1305 one-time key is the first block of ChaCha20
//! keystream at counter 0, payload encryption starts at counter 1, and the
//! MAC covers `aad ‖ pad16(aad) ‖ ciphertext ‖ pad16(ciphertext) ‖ len64(aad) ‖ len64(ciphertext)`.

use mesh_types::{MeshError, MeshResult};
use subtle::ConstantTimeEq;

use crate::chacha20;
use crate::poly1305::Poly1305;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

fn poly1305_key(key: &[u8; 32], nonce: &[u8; 12]) -> [u8; 32] {
    let block = chacha20::block(key, 0, nonce);
    block[..32].try_into().unwrap()
}

fn pad16_len(len: usize) -> usize {
    (16 - (len % 16)) % 16
}

fn mac_input(aad: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(
        aad.len() + pad16_len(aad.len()) + ciphertext.len() + pad16_len(ciphertext.len()) + 16,
    );
    data.extend_from_slice(aad);
    data.extend(std::iter::repeat(0u8).take(pad16_len(aad.len())));
    data.extend_from_slice(ciphertext);
    data.extend(std::iter::repeat(0u8).take(pad16_len(ciphertext.len())));
    data.extend_from_slice(&(aad.len() as u64).to_le_bytes());
    data.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());
    data
}

fn validate_sizes(key: &[u8], nonce: &[u8]) -> MeshResult<()> {
    if key.len() != KEY_LEN {
        return Err(MeshError::InvalidKey(format!(
            "expected a {KEY_LEN}-byte key, got {}",
            key.len()
        )));
    }
    if nonce.len() != NONCE_LEN {
        return Err(MeshError::InvalidNonce(format!(
            "expected a {NONCE_LEN}-byte nonce, got {}",
            nonce.len()
        )));
    }
    Ok(())
}

/// Encrypts `plaintext` under `(key, nonce)`, authenticating `aad`.
/// Returns `ciphertext ‖ tag` (`plaintext.len() + 16` bytes).
pub fn encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> MeshResult<Vec<u8>> {
    validate_sizes(key, nonce)?;
    let key: [u8; 32] = key.try_into().unwrap();
    let nonce: [u8; 12] = nonce.try_into().unwrap();

    let mut ciphertext = plaintext.to_vec();
    chacha20::apply_keystream(&key, 1, &nonce, &mut ciphertext);

    let mac_key = poly1305_key(&key, &nonce);
    let tag = Poly1305::mac(&mac_key, &mac_input(aad, &ciphertext));

    ciphertext.extend_from_slice(&tag);
    Ok(ciphertext)
}

/// Decrypts `ciphertext ‖ tag` under `(key, nonce)`, verifying `aad`.
///
/// The 16-byte tag comparison is constant-time (`subtle::ConstantTimeEq`)
/// regardless of where a mismatch occurs. On failure, returns
/// [`MeshError::AuthTagMismatch`] without exposing any plaintext.
pub fn decrypt(key: &[u8], nonce: &[u8], ciphertext_and_tag: &[u8], aad: &[u8]) -> MeshResult<Vec<u8>> {
    validate_sizes(key, nonce)?;
    if ciphertext_and_tag.len() < TAG_LEN {
        return Err(MeshError::Validation(format!(
            "ciphertext shorter than the {TAG_LEN}-byte tag"
        )));
    }
    let key: [u8; 32] = key.try_into().unwrap();
    let nonce: [u8; 12] = nonce.try_into().unwrap();

    let split = ciphertext_and_tag.len() - TAG_LEN;
    let ciphertext = &ciphertext_and_tag[..split];
    let received_tag = &ciphertext_and_tag[split..];

    let mac_key = poly1305_key(&key, &nonce);
    let expected_tag = Poly1305::mac(&mac_key, &mac_input(aad, ciphertext));

    if expected_tag.ct_eq(received_tag).unwrap_u8() != 1 {
        return Err(MeshError::AuthTagMismatch);
    }

    let mut plaintext = ciphertext.to_vec();
    chacha20::apply_keystream(&key, 1, &nonce, &mut plaintext);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8439 §2.8.2 test vector.
    #[test]
    fn rfc8439_vector() {
        let key: [u8; 32] =
            hex_literal::hex!("808182838485868788898a8b8c8d8e8f909192939495969798999a9b9c9d9e9f");
        let nonce: [u8; 12] = hex_literal::hex!("070000004041424344454647");
        let aad: [u8; 12] = hex_literal::hex!("50515253c0c1c2c3c4c5c6c7");
        let plaintext = b"Ladies and Gentlemen of the class of '99: If I could offer you only one tip for the future, sunscreen would be it.";

        let out = encrypt(&key, &nonce, plaintext, &aad).unwrap();
        assert!(out.starts_with(&hex_literal::hex!("d31a8d34648e60db7b86afbc53ef7ec2")));
        assert!(out.ends_with(&hex_literal::hex!("1ae10b594f09e26a7e902ecbd0600691")));

        let decrypted = decrypt(&key, &nonce, &out, &aad).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn round_trip() {
        let key = [1u8; 32];
        let nonce = [2u8; 12];
        let plaintext = b"mesh message payload";
        let aad = b"header";
        let ct = encrypt(&key, &nonce, plaintext, aad).unwrap();
        assert_eq!(ct.len(), plaintext.len() + TAG_LEN);
        let pt = decrypt(&key, &nonce, &ct, aad).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn bit_flip_sweep_breaks_decryption() {
        let key = [3u8; 32];
        let nonce = [4u8; 12];
        let plaintext = b"short";
        let aad = b"a";
        let ct = encrypt(&key, &nonce, plaintext, aad).unwrap();

        for bit in 0..(ct.len() * 8) {
            let mut tampered = ct.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            assert!(decrypt(&key, &nonce, &tampered, aad).is_err());
        }

        let mut bad_aad = aad.to_vec();
        bad_aad[0] ^= 1;
        assert!(decrypt(&key, &nonce, &ct, &bad_aad).is_err());

        let mut bad_key = key;
        bad_key[0] ^= 1;
        assert!(decrypt(&bad_key, &nonce, &ct, aad).is_err());

        let mut bad_nonce = nonce;
        bad_nonce[0] ^= 1;
        assert!(decrypt(&key, &bad_nonce, &ct, aad).is_err());
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert!(matches!(
            encrypt(&[0u8; 31], &[0u8; 12], b"x", b""),
            Err(MeshError::InvalidKey(_))
        ));
        assert!(matches!(
            encrypt(&[0u8; 32], &[0u8; 11], b"x", b""),
            Err(MeshError::InvalidNonce(_))
        ));
        assert!(matches!(
            decrypt(&[0u8; 32], &[0u8; 12], &[0u8; 4], b""),
            Err(MeshError::Validation(_))
        ));
    }
}
