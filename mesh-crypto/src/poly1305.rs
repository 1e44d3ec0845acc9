//! Poly1305 one-time authenticator (RFC 8439 §2.5), computed with the
//! classic three-limb (44/44/42-bit) representation of the 130-bit
//! accumulator so the whole thing runs on plain `u64`/`u128` arithmetic
//! without a bignum dependency.

const LOW_44: u64 = 0xfff_ffff_ffff;
const LOW_42: u64 = 0x3ff_ffff_ffff;

pub struct Poly1305 {
    r: [u64; 3],
    s: [u64; 2],
    h: [u64; 3],
    buffer: [u8; 16],
    buffered: usize,
}

impl Poly1305 {
    /// `key` is the one-time 32-byte Poly1305 key: the first 16 bytes are
    /// `r` (clamped internally), the last 16 are the additive `s`.
    pub fn new(key: &[u8; 32]) -> Self {
        let t0 = u64::from_le_bytes(key[0..8].try_into().unwrap());
        let t1 = u64::from_le_bytes(key[8..16].try_into().unwrap());

        let r0 = t0 & 0xffc0_ffff_fff;
        let r1 = ((t0 >> 44) | (t1 << 20)) & 0xfffff_c0ffff;
        let r2 = (t1 >> 24) & 0x00ffff_ffc0f;

        Poly1305 {
            r: [r0, r1, r2],
            s: [
                u64::from_le_bytes(key[16..24].try_into().unwrap()),
                u64::from_le_bytes(key[24..32].try_into().unwrap()),
            ],
            h: [0, 0, 0],
            buffer: [0u8; 16],
            buffered: 0,
        }
    }

    fn process_block(&mut self, block: &[u8; 16], hibit: u64) {
        let t0 = u64::from_le_bytes(block[0..8].try_into().unwrap());
        let t1 = u64::from_le_bytes(block[8..16].try_into().unwrap());

        let mut h0 = self.h[0] + (t0 & LOW_44);
        let mut h1 = self.h[1] + (((t0 >> 44) | (t1 << 20)) & LOW_44);
        let mut h2 = self.h[2] + (((t1 >> 24) & LOW_42) | hibit);

        let r0 = self.r[0] as u128;
        let r1 = self.r[1] as u128;
        let r2 = self.r[2] as u128;
        let s1 = r1 * 20; // r1 * (5 << 2)
        let s2 = r2 * 20; // r2 * (5 << 2)

        let mut d0 = (h0 as u128) * r0 + (h1 as u128) * s2 + (h2 as u128) * s1;
        let mut d1 = (h0 as u128) * r1 + (h1 as u128) * r0 + (h2 as u128) * s2;
        let mut d2 = (h0 as u128) * r2 + (h1 as u128) * r1 + (h2 as u128) * r0;

        let mut c = (d0 >> 44) as u64;
        h0 = (d0 as u64) & LOW_44;
        d1 += c as u128;

        c = (d1 >> 44) as u64;
        h1 = (d1 as u64) & LOW_44;
        d2 += c as u128;

        c = (d2 >> 42) as u64;
        h2 = (d2 as u64) & LOW_42;
        h0 += c * 5;

        c = h0 >> 44;
        h0 &= LOW_44;
        h1 += c;

        self.h = [h0, h1, h2];
        let _ = &mut d0; // silence unused-mut after final read
    }

    fn update(&mut self, mut data: &[u8]) {
        if self.buffered > 0 {
            let need = 16 - self.buffered;
            let take = need.min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];
            if self.buffered == 16 {
                let block = self.buffer;
                self.process_block(&block, 1u64 << 40);
                self.buffered = 0;
            }
        }

        while data.len() >= 16 {
            let block: [u8; 16] = data[..16].try_into().unwrap();
            self.process_block(&block, 1u64 << 40);
            data = &data[16..];
        }

        if !data.is_empty() {
            self.buffer[..data.len()].copy_from_slice(data);
            self.buffered = data.len();
        }
    }

    fn finish(mut self) -> [u8; 16] {
        if self.buffered > 0 {
            let mut block = [0u8; 16];
            block[..self.buffered].copy_from_slice(&self.buffer[..self.buffered]);
            block[self.buffered] = 1;
            self.process_block(&block, 0);
        }

        let (mut h0, mut h1, mut h2) = (self.h[0], self.h[1], self.h[2]);

        let mut c = h1 >> 44;
        h1 &= LOW_44;
        h2 += c;
        c = h2 >> 42;
        h2 &= LOW_42;
        h0 += c * 5;
        c = h0 >> 44;
        h0 &= LOW_44;
        h1 += c;
        c = h1 >> 44;
        h1 &= LOW_44;
        h2 += c;
        c = h2 >> 42;
        h2 &= LOW_42;
        h0 += c * 5;
        c = h0 >> 44;
        h0 &= LOW_44;
        h1 += c;

        let mut g0 = h0 + 5;
        c = g0 >> 44;
        g0 &= LOW_44;
        let mut g1 = h1 + c;
        c = g1 >> 44;
        g1 &= LOW_44;
        let g2 = h2.wrapping_add(c).wrapping_sub(1u64 << 42);

        // select h if h < p, else h + -p
        let mask = 0u64.wrapping_sub(g2 >> 63);
        g0 &= mask;
        g1 &= mask;
        let not_mask = !mask;
        h0 = (h0 & not_mask) | g0;
        h1 = (h1 & not_mask) | g1;

        let t0 = self.s[0];
        let t1 = self.s[1];

        h0 += t0 & LOW_44;
        c = h0 >> 44;
        h0 &= LOW_44;
        h1 += (((t0 >> 44) | (t1 << 20)) & LOW_44) + c;
        c = h1 >> 44;
        h1 &= LOW_44;
        h2 = (h2 + ((t1 >> 24) & LOW_42) + c) & LOW_42;

        let lo = h0 | (h1 << 44);
        let hi = (h1 >> 20) | (h2 << 24);

        let mut mac = [0u8; 16];
        mac[0..8].copy_from_slice(&lo.to_le_bytes());
        mac[8..16].copy_from_slice(&hi.to_le_bytes());
        mac
    }

    pub fn mac(key: &[u8; 32], data: &[u8]) -> [u8; 16] {
        let mut p = Poly1305::new(key);
        p.update(data);
        p.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 8439 §2.5.2 test vector.
    #[test]
    fn mac_matches_rfc8439_vector() {
        let key: [u8; 32] = hex_literal::hex!(
            "85d6be7857556d337f4452fe42d506a80103808afb0db2fd4abff6af4149f51b"
        );
        let message = b"Cryptographic Forum Research Group";
        let tag = Poly1305::mac(&key, message);
        let expected: [u8; 16] = hex_literal::hex!("a8061dc1305136c6c22b8baf0c0127a9");
        assert_eq!(tag, expected);
    }
}
