//! X25519 (RFC 7748) Diffie-Hellman over Curve25519.
//!
//! Field elements are represented the same way Poly1305's accumulator is in
//! `poly1305.rs`: a fixed-width limb array (here 16 limbs of 16 bits,
//! radix 2^16) with carries propagated by hand, so the whole module runs on
//! plain `i64` arithmetic with no bignum dependency. The Montgomery ladder
//! walks the scalar bit by bit using a constant-time conditional swap
//! (`cswap25519`, an XOR-mask select rather than a branch) so the trace does
//! not depend on the secret scalar.

use rand::RngCore;
use zeroize::Zeroize;

pub const KEY_LEN: usize = 32;

type Fe = [i64; 16];

const GF0: Fe = [0; 16];
const GF1: Fe = {
    let mut g = [0i64; 16];
    g[0] = 1;
    g
};
const A24: Fe = {
    // 121665, the Montgomery curve constant (A - 2) / 4 for Curve25519.
    let mut g = [0i64; 16];
    g[0] = 0xdb41;
    g[1] = 1;
    g
};

/// Propagates carries through a loose field element, reducing mod 2^255-19
/// (2^256 ≡ 38 mod p, so overflow out of limb 15 feeds back into limb 0
/// scaled by 38 rather than the usual 1x ripple into the next limb).
fn carry(o: &mut Fe) {
    for i in 0..16 {
        o[i] += 1 << 16;
        let c = o[i] >> 16;
        let next = (i + 1) * usize::from(i < 15);
        // The carry out of limb 15 represents position 2^256 ≡ 2·19 = 38
        // (mod p), so it folds back into limb 0 scaled by 38 rather than 1;
        // written as the common `(c-1)` term plus a 37x correction so the
        // i<15 case (where it really is a 1x ripple into the next limb)
        // shares the same expression.
        o[next] += (c - 1) + 37 * (c - 1) * i64::from(i == 15);
        o[i] -= c << 16;
    }
}

/// Constant-time conditional swap of two field elements, driven by `swap`
/// (expected to be 0 or 1) rather than a branch.
fn cswap25519(p: &mut Fe, q: &mut Fe, swap: i64) {
    let mask = !(swap - 1);
    for i in 0..16 {
        let t = mask & (p[i] ^ q[i]);
        p[i] ^= t;
        q[i] ^= t;
    }
}

fn fe_add(o: &mut Fe, a: &Fe, b: &Fe) {
    for i in 0..16 {
        o[i] = a[i] + b[i];
    }
}

fn fe_sub(o: &mut Fe, a: &Fe, b: &Fe) {
    for i in 0..16 {
        o[i] = a[i] - b[i];
    }
}

fn fe_mul(o: &mut Fe, a: &Fe, b: &Fe) {
    let mut t = [0i64; 31];
    for i in 0..16 {
        for j in 0..16 {
            t[i + j] += a[i] * b[j];
        }
    }
    for i in 15..=30 {
        t[i - 15] += 38 * t[i];
    }
    o.copy_from_slice(&t[0..16]);
    carry(o);
    carry(o);
}

fn fe_sq(o: &mut Fe, a: &Fe) {
    let a_copy = *a;
    fe_mul(o, &a_copy, &a_copy);
}

/// `a^(p-2) mod p` via Fermat's little theorem, using the fixed public
/// exponent `p - 2 = 2^255 - 21`'s bit pattern (not secret-dependent, so the
/// `a != 2 && a != 4` skip below is safe to branch on).
fn fe_invert(o: &mut Fe, i: &Fe) {
    let mut c = *i;
    for a in (0..=253).rev() {
        let prev = c;
        fe_sq(&mut c, &prev);
        if a != 2 && a != 4 {
            let squared = c;
            fe_mul(&mut c, &squared, i);
        }
    }
    *o = c;
}

fn unpack25519(n: &[u8; 32]) -> Fe {
    let mut o = [0i64; 16];
    for i in 0..16 {
        o[i] = i64::from(n[2 * i]) + (i64::from(n[2 * i + 1]) << 8);
    }
    o[15] &= 0x7fff;
    o
}

fn pack25519(n: &Fe) -> [u8; 32] {
    let mut t = *n;
    carry(&mut t);
    carry(&mut t);
    carry(&mut t);

    for _ in 0..2 {
        let mut m = [0i64; 16];
        m[0] = t[0] - 0xffed;
        for i in 1..15 {
            m[i] = t[i] - 0xffff - ((m[i - 1] >> 16) & 1);
            m[i - 1] &= 0xffff;
        }
        m[15] = t[15] - 0x7fff - ((m[14] >> 16) & 1);
        let b = (m[15] >> 16) & 1;
        m[14] &= 0xffff;
        cswap25519(&mut t, &mut m, 1 - b);
    }

    let mut o = [0u8; 32];
    for i in 0..16 {
        o[2 * i] = (t[i] & 0xff) as u8;
        o[2 * i + 1] = (t[i] >> 8) as u8;
    }
    o
}

/// Curve25519 scalar multiplication: `n * p`, where `p` is the 32-byte
/// u-coordinate of a Montgomery curve point and `n` is clamped per RFC 7748
/// §5 before use (so callers may pass a raw, unclamped secret scalar).
fn crypto_scalar_mult(n: &[u8; 32], p: &[u8; 32]) -> [u8; 32] {
    let mut z = *n;
    z[31] = (n[31] & 127) | 64;
    z[0] &= 248;

    let x = unpack25519(p);
    let mut a = GF1;
    let mut b = x;
    let mut c = GF0;
    let mut d = GF1;

    // Montgomery ladder, one step per scalar bit from the top down, via the
    // standard differential addition/doubling formulas. Every intermediate
    // gets its own binding (a0, a1, a2, ...) rather than being mutated
    // through a shared register, so each line can be checked against the
    // formula it implements without tracking hidden aliasing.
    for i in (0..=254).rev() {
        let r = (i64::from(z[(i >> 3) as usize]) >> (i & 7)) & 1;
        cswap25519(&mut a, &mut b, r);
        cswap25519(&mut c, &mut d, r);
        let (a0, b0, c0, d0) = (a, b, c, d);

        let mut e0 = GF0;
        fe_add(&mut e0, &a0, &c0); // e = a + c
        let mut a1 = GF0;
        fe_sub(&mut a1, &a0, &c0); // a = a - c
        let mut c1 = GF0;
        fe_add(&mut c1, &b0, &d0); // c = b + d
        let mut b1 = GF0;
        fe_sub(&mut b1, &b0, &d0); // b = b - d
        let mut d1 = GF0;
        fe_sq(&mut d1, &e0); // d = e^2
        let mut f0 = GF0;
        fe_sq(&mut f0, &a1); // f = a^2
        let mut a2 = GF0;
        fe_mul(&mut a2, &c1, &a1); // a = c * a
        let mut c2 = GF0;
        fe_mul(&mut c2, &b1, &e0); // c = b * e
        let mut e1 = GF0;
        fe_add(&mut e1, &a2, &c2); // e = a + c
        let mut a3 = GF0;
        fe_sub(&mut a3, &a2, &c2); // a = a - c
        let mut b2 = GF0;
        fe_sq(&mut b2, &a3); // b = a^2
        let mut c3 = GF0;
        fe_sub(&mut c3, &d1, &f0); // c = d - f
        let mut a4 = GF0;
        fe_mul(&mut a4, &c3, &A24); // a = c * 121665
        let mut a5 = GF0;
        fe_add(&mut a5, &a4, &d1); // a = a + d
        let mut c4 = GF0;
        fe_mul(&mut c4, &c3, &a5); // c = c * a
        let mut a6 = GF0;
        fe_mul(&mut a6, &d1, &f0); // a = d * f
        let mut d2 = GF0;
        fe_mul(&mut d2, &b2, &x); // d = b * x
        let mut b3 = GF0;
        fe_sq(&mut b3, &e1); // b = e^2

        a = a6;
        b = b3;
        c = c4;
        d = d2;

        cswap25519(&mut a, &mut b, r);
        cswap25519(&mut c, &mut d, r);
    }

    let mut c_inv = GF0;
    fe_invert(&mut c_inv, &c);
    let mut out = GF0;
    fe_mul(&mut out, &a, &c_inv);
    pack25519(&out)
}

/// Generates a fresh X25519 key pair: a clamped 32-byte secret scalar and
/// its corresponding public point.
pub fn generate_key_pair() -> ([u8; 32], [u8; 32]) {
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    let public = scalar_mult_base(&secret);
    (secret, public)
}

/// `scalar_mult(sk, peer_pk) -> shared_secret`. `sk` is clamped internally
/// per RFC 7748 §5, matching the semantics of a raw secret scalar rather
/// than a pre-clamped one.
pub fn scalar_mult(sk: &[u8; 32], peer_pk: &[u8; 32]) -> [u8; 32] {
    crypto_scalar_mult(sk, peer_pk)
}

/// `scalar_mult_base(sk) = scalar_mult(sk, basepoint(9))`.
pub fn scalar_mult_base(sk: &[u8; 32]) -> [u8; 32] {
    let mut base = [0u8; 32];
    base[0] = 9;
    crypto_scalar_mult(sk, &base)
}

/// Zeroizes a secret scalar in place.
pub fn zeroize_secret(sk: &mut [u8; 32]) {
    sk.zeroize();
}
