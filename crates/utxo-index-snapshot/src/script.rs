use crate::pubkey::{decompress_pubkey, is_on_curve, UNCOMPRESSED_PUBKEY_LEN};
use crate::reader::BinaryCursor;
use crate::serialize::{read_varint, write_varint};
use crate::{Error, Result};
use std::io::{self, Read, Write};

/// Number of reserved size codes for templated scripts.
pub const NUM_SPECIAL_SCRIPTS: u64 = 6;

/// Largest verbatim script accepted by the decoder.
pub const MAX_SCRIPT_SIZE: u64 = 10_000;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_EQUAL: u8 = 0x87;

fn p2pkh(hash: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend([OP_DUP, OP_HASH160, 20]);
    script.extend_from_slice(hash);
    script.extend([OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

fn p2sh(hash: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.extend([OP_HASH160, 20]);
    script.extend_from_slice(hash);
    script.push(OP_EQUAL);
    script
}

fn p2pk(pubkey: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    script.push(OP_CHECKSIG);
    script
}

/// Reads one compressed script and expands it to the full locking script.
///
// https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/compressor.cpp#L95
pub fn decompress_script<R: Read>(cursor: &mut BinaryCursor<R>) -> Result<Vec<u8>> {
    let size = read_varint(cursor)?;

    match size {
        0x00 => Ok(p2pkh(cursor.read(20)?)),
        0x01 => Ok(p2sh(cursor.read(20)?)),
        0x02 | 0x03 => {
            let mut pubkey = [0u8; 33];
            pubkey[0] = size as u8;
            pubkey[1..].copy_from_slice(cursor.read(32)?);
            Ok(p2pk(&pubkey))
        }
        0x04 | 0x05 => {
            let mut compressed = [0u8; 33];
            compressed[0] = (size - 2) as u8;
            compressed[1..].copy_from_slice(cursor.read(32)?);
            Ok(p2pk(&decompress_pubkey(&compressed)?))
        }
        _ => {
            let len = size - NUM_SPECIAL_SCRIPTS;
            if len > MAX_SCRIPT_SIZE {
                return Err(Error::ScriptTooLong(len));
            }
            cursor.read_vec(len as usize)
        }
    }
}

fn to_key_id(script: &[u8]) -> Option<&[u8]> {
    (script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG)
        .then(|| &script[3..23])
}

fn to_script_id(script: &[u8]) -> Option<&[u8]> {
    (script.len() == 23 && script[0] == OP_HASH160 && script[1] == 20 && script[22] == OP_EQUAL)
        .then(|| &script[2..22])
}

/// Returns the compressed form `prefix || x` of a pay-to-pubkey script.
fn to_pubkey(script: &[u8]) -> Option<[u8; 33]> {
    let mut out = [0u8; 33];

    if script.len() == 35
        && script[0] == 33
        && script[34] == OP_CHECKSIG
        && (script[1] == 0x02 || script[1] == 0x03)
    {
        out.copy_from_slice(&script[1..34]);
        return Some(out);
    }

    if script.len() == 67 && script[0] == 65 && script[66] == OP_CHECKSIG && script[1] == 0x04 {
        let mut uncompressed = [0u8; UNCOMPRESSED_PUBKEY_LEN];
        uncompressed.copy_from_slice(&script[1..66]);
        // An invalid point could not be restored on decompression.
        if !is_on_curve(&uncompressed) {
            return None;
        }
        out[0] = 0x04 | (uncompressed[64] & 0x01);
        out[1..].copy_from_slice(&uncompressed[1..33]);
        return Some(out);
    }

    None
}

/// Writes `script` in the compressed form read by [`decompress_script`].
pub fn compress_script<W: Write>(writer: &mut W, script: &[u8]) -> io::Result<()> {
    if let Some(hash) = to_key_id(script) {
        writer.write_all(&[0x00])?;
        writer.write_all(hash)
    } else if let Some(hash) = to_script_id(script) {
        writer.write_all(&[0x01])?;
        writer.write_all(hash)
    } else if let Some(pubkey) = to_pubkey(script) {
        writer.write_all(&pubkey)
    } else {
        write_varint(writer, script.len() as u64 + NUM_SPECIAL_SCRIPTS)?;
        writer.write_all(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use std::io::Cursor;

    fn decode(data: &[u8]) -> Result<Vec<u8>> {
        let mut cursor = BinaryCursor::new(Cursor::new(data.to_vec()), data.len() as u64, 64);
        let script = decompress_script(&mut cursor)?;
        assert!(cursor.at_end());
        Ok(script)
    }

    fn round_trip(script: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::new();
        compress_script(&mut encoded, script).unwrap();
        assert_eq!(decode(&encoded).unwrap(), script);
        encoded
    }

    #[test]
    fn p2pkh_template() {
        let hash = hex!("0102030405060708090a0b0c0d0e0f1011121314");
        let mut data = vec![0x00];
        data.extend(hash);

        assert_eq!(
            decode(&data).unwrap(),
            hex!("76a9140102030405060708090a0b0c0d0e0f101112131488ac")
        );
        assert_eq!(round_trip(&hex!("76a9140102030405060708090a0b0c0d0e0f101112131488ac")), data);
    }

    #[test]
    fn p2sh_template() {
        let script = hex!("a91400112233445566778899aabbccddeeff0011223387");
        let encoded = round_trip(&script);
        assert_eq!(encoded.len(), 21);
        assert_eq!(encoded[0], 0x01);
    }

    #[test]
    fn compressed_p2pk_template() {
        let mut data = vec![0x03];
        data.extend([0x11; 32]);

        let mut expected = vec![33u8, 0x03];
        expected.extend([0x11; 32]);
        expected.push(OP_CHECKSIG);

        assert_eq!(decode(&data).unwrap(), expected);
        assert_eq!(round_trip(&expected), data);
    }

    #[test]
    fn uncompressed_p2pk_template() {
        // Pay-to-pubkey output of the first mainnet coinbase after genesis.
        let script = hex!("410496b538e853519c726a2c91e61ec11600ae1390813a627c66fb8be7947be63c52da7589379515d4e0a604f8141781e62294721166bf621e73a82cbf2342c858eeac");
        let encoded = round_trip(&script);
        assert_eq!(encoded.len(), 33);
        assert_eq!(encoded[0], 0x04);
    }

    #[test]
    fn invalid_uncompressed_key_is_stored_verbatim() {
        let mut script = vec![65u8, 0x04];
        script.extend([0x01; 64]);
        script.push(OP_CHECKSIG);

        let encoded = round_trip(&script);
        assert_eq!(encoded.len(), 1 + script.len());
        assert_eq!(encoded[0], 67 + 6);
    }

    #[test]
    fn raw_script() {
        let multisig = hex!("5121030b3810fd20fd3771517b2b8847d225791035ea06768e17c733a5756b6005bf55210222b6e887bb4d4bca08f97348e6b8561e6d11e0ed96dec0584b34d709078cd4a54104289699814d1c9ef35ae45cfb41116501c15b0141430a481226aa19bcb8806c7223802d24f2638d8ce14378137dd52114d1d965e2969b5b3ac011c25e2803eb5753ae");
        let encoded = round_trip(&multisig);
        // 137 + 6 needs a two-byte size.
        assert_eq!(&encoded[..2], &[0x80, 0x0f]);

        let op_return = hex!("6a0b68656c6c6f20776f726c64");
        assert_eq!(round_trip(&op_return)[0], 13 + 6);

        assert_eq!(round_trip(&[]), [0x06]);
    }

    #[test]
    fn script_too_long() {
        let mut data = Vec::new();
        write_varint(&mut data, MAX_SCRIPT_SIZE + 1 + NUM_SPECIAL_SCRIPTS).unwrap();
        assert!(matches!(decode(&data), Err(Error::ScriptTooLong(10_001))));
    }

    #[test]
    fn truncated_template() {
        let data = [0x00, 0x01, 0x02];
        assert!(matches!(
            decode(&data),
            Err(Error::UnexpectedEndOfInput { requested: 20, .. })
        ));
    }

    #[test]
    fn uncompressed_template_off_curve() {
        let mut data = vec![0x04];
        let mut x = [0u8; 32];
        x[31] = 5;
        data.extend(x);
        assert!(matches!(decode(&data), Err(Error::PointNotOnCurve)));
    }
}
