//! secp256k1 point decompression over the field `p = 2^256 - 2^32 - 977`.

use crate::{Error, Result};
use num_bigint::BigUint;
use num_traits::One;
use std::sync::OnceLock;

/// Length of a compressed public key.
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Length of an uncompressed public key.
pub const UNCOMPRESSED_PUBKEY_LEN: usize = 65;

struct Field {
    p: BigUint,
    /// `(p + 1) / 4`, the square root exponent for `p = 3 mod 4`.
    sqrt_exp: BigUint,
    seven: BigUint,
}

fn field() -> &'static Field {
    static FIELD: OnceLock<Field> = OnceLock::new();
    FIELD.get_or_init(|| {
        let p = (BigUint::one() << 256u32) - (BigUint::one() << 32u32) - BigUint::from(977u32);
        let sqrt_exp = (&p + BigUint::one()) >> 2u32;
        Field {
            p,
            sqrt_exp,
            seven: BigUint::from(7u32),
        }
    })
}

/// `x^3 + 7 mod p`.
fn curve_rhs(x: &BigUint, field: &Field) -> BigUint {
    (x.modpow(&BigUint::from(3u32), &field.p) + &field.seven) % &field.p
}

fn to_be_32(n: &BigUint) -> [u8; 32] {
    let bytes = n.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Expands a 33-byte compressed point to its 65-byte uncompressed form `04 || x || y`.
pub fn decompress_pubkey(compressed: &[u8; COMPRESSED_PUBKEY_LEN]) -> Result<[u8; UNCOMPRESSED_PUBKEY_LEN]> {
    let prefix = compressed[0];
    if prefix != 0x02 && prefix != 0x03 {
        return Err(Error::InvalidPubkey(prefix));
    }

    let field = field();
    let x = BigUint::from_bytes_be(&compressed[1..]);
    if x >= field.p {
        return Err(Error::PointNotOnCurve);
    }

    let rhs = curve_rhs(&x, field);
    let mut y = rhs.modpow(&field.sqrt_exp, &field.p);
    if (&y * &y) % &field.p != rhs {
        return Err(Error::PointNotOnCurve);
    }

    let odd = y.bit(0);
    if odd != (prefix & 0x01 == 0x01) {
        y = &field.p - y;
    }

    let mut out = [0u8; UNCOMPRESSED_PUBKEY_LEN];
    out[0] = 0x04;
    out[1..33].copy_from_slice(&compressed[1..]);
    out[33..].copy_from_slice(&to_be_32(&y));
    Ok(out)
}

/// Whether `04 || x || y` is a point on the curve.
pub fn is_on_curve(uncompressed: &[u8; UNCOMPRESSED_PUBKEY_LEN]) -> bool {
    if uncompressed[0] != 0x04 {
        return false;
    }

    let field = field();
    let x = BigUint::from_bytes_be(&uncompressed[1..33]);
    let y = BigUint::from_bytes_be(&uncompressed[33..]);
    if x >= field.p || y >= field.p {
        return false;
    }

    (&y * &y) % &field.p == curve_rhs(&x, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const G_X: [u8; 32] = hex!("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
    const G_Y: [u8; 32] = hex!("483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8");

    fn compressed(prefix: u8, x: &[u8; 32]) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = prefix;
        out[1..].copy_from_slice(x);
        out
    }

    #[test]
    fn decompress_generator() {
        let uncompressed = decompress_pubkey(&compressed(0x02, &G_X)).unwrap();
        assert_eq!(uncompressed[0], 0x04);
        assert_eq!(uncompressed[1..33], G_X);
        assert_eq!(uncompressed[33..], G_Y);
        assert!(is_on_curve(&uncompressed));
    }

    #[test]
    fn parity_selects_negated_root() {
        let even = decompress_pubkey(&compressed(0x02, &G_X)).unwrap();
        let odd = decompress_pubkey(&compressed(0x03, &G_X)).unwrap();

        assert_eq!(even[64] & 1, 0);
        assert_eq!(odd[64] & 1, 1);
        assert!(is_on_curve(&odd));

        let field = field();
        let y_even = BigUint::from_bytes_be(&even[33..]);
        let y_odd = BigUint::from_bytes_be(&odd[33..]);
        assert_eq!(y_even + y_odd, field.p);
    }

    #[test]
    fn satoshi_genesis_key() {
        let uncompressed = hex!("0496b538e853519c726a2c91e61ec11600ae1390813a627c66fb8be7947be63c52da7589379515d4e0a604f8141781e62294721166bf621e73a82cbf2342c858ee");
        let mut x = [0u8; 32];
        x.copy_from_slice(&uncompressed[1..33]);

        assert_eq!(decompress_pubkey(&compressed(0x02, &x)).unwrap(), uncompressed);
    }

    #[test]
    fn output_satisfies_curve_equation() {
        for x in [1u8, 2, 3, 4, 6] {
            let mut x_bytes = [0u8; 32];
            x_bytes[31] = x;
            for prefix in [0x02, 0x03] {
                let point = decompress_pubkey(&compressed(prefix, &x_bytes)).unwrap();
                let field = field();
                let x = BigUint::from_bytes_be(&point[1..33]);
                let y = BigUint::from_bytes_be(&point[33..]);
                assert_eq!((&y * &y) % &field.p, curve_rhs(&x, field));
            }
        }
    }

    #[test]
    fn invalid_prefix() {
        assert!(matches!(
            decompress_pubkey(&compressed(0x04, &G_X)),
            Err(Error::InvalidPubkey(0x04))
        ));
    }

    #[test]
    fn point_not_on_curve() {
        let mut x = [0u8; 32];
        x[31] = 5;
        assert!(matches!(
            decompress_pubkey(&compressed(0x02, &x)),
            Err(Error::PointNotOnCurve)
        ));
    }
}
