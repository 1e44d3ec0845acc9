//! ChaCha20 stream cipher (RFC 8439 §2.3/§2.4), implemented directly from
//! the quarter-round definition rather than pulled in as a dependency —
//! this and [`crate::poly1305`] are the primitives [`crate::aead`] composes
//! into the AEAD construction.

const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

#[inline(always)]
fn quarter_round(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(16);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(12);

    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(8);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(7);
}

fn init_state(key: &[u8; 32], counter: u32, nonce: &[u8; 12]) -> [u32; 16] {
    let mut state = [0u32; 16];
    state[0..4].copy_from_slice(&CONSTANTS);
    for i in 0..8 {
        state[4 + i] = u32::from_le_bytes(key[4 * i..4 * i + 4].try_into().unwrap());
    }
    state[12] = counter;
    for i in 0..3 {
        state[13 + i] = u32::from_le_bytes(nonce[4 * i..4 * i + 4].try_into().unwrap());
    }
    state
}

/// Produces one 64-byte keystream block for `(key, counter, nonce)`.
pub fn block(key: &[u8; 32], counter: u32, nonce: &[u8; 12]) -> [u8; 64] {
    let initial = init_state(key, counter, nonce);
    let mut working = initial;

    for _ in 0..10 {
        quarter_round(&mut working, 0, 4, 8, 12);
        quarter_round(&mut working, 1, 5, 9, 13);
        quarter_round(&mut working, 2, 6, 10, 14);
        quarter_round(&mut working, 3, 7, 11, 15);
        quarter_round(&mut working, 0, 5, 10, 15);
        quarter_round(&mut working, 1, 6, 11, 12);
        quarter_round(&mut working, 2, 7, 8, 13);
        quarter_round(&mut working, 3, 4, 9, 14);
    }

    let mut out = [0u8; 64];
    for i in 0..16 {
        let word = working[i].wrapping_add(initial[i]);
        out[4 * i..4 * i + 4].copy_from_slice(&word.to_le_bytes());
    }
    out
}

/// Encrypts (or decrypts, since ChaCha20 XORs a keystream) `data` in place,
/// starting the block counter at `initial_counter`.
pub fn apply_keystream(key: &[u8; 32], initial_counter: u32, nonce: &[u8; 12], data: &mut [u8]) {
    for (i, chunk) in data.chunks_mut(64).enumerate() {
        let counter = initial_counter.wrapping_add(i as u32);
        let keystream = block(key, counter, nonce);
        for (byte, ks) in chunk.iter_mut().zip(keystream.iter()) {
            *byte ^= ks;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8439 §2.3.2 test vector.
    #[test]
    fn block_matches_rfc8439_vector() {
        let key: [u8; 32] = hex_literal::hex!(
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
        );
        let nonce: [u8; 12] = hex_literal::hex!("000000090000004a00000000");
        let out = block(&key, 1, &nonce);
        let expected: [u8; 64] = hex_literal::hex!(
            "10f1e7e4d13b5915500fdd1fa32071c4c7d1f4c733c068030422aa9ac3d46c4ed2826446079faa0914c2d705d98b02a2b5129cd1de164eb9cbd083e8a2503c4e"
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn apply_keystream_is_involutive() {
        let key = [7u8; 32];
        let nonce = [9u8; 12];
        let mut data = b"hello chacha20 world, this spans more than one block!!".to_vec();
        let original = data.clone();
        apply_keystream(&key, 0, &nonce, &mut data);
        assert_ne!(data, original);
        apply_keystream(&key, 0, &nonce, &mut data);
        assert_eq!(data, original);
    }
}
