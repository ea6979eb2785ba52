use crate::reader::BinaryCursor;
use crate::{Error, Result};
use std::io::{self, Read, Write};

// https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/serialize.h#L305
pub fn write_compact_size<W: Write>(writer: &mut W, size: u64) -> io::Result<()> {
    if size < 253 {
        writer.write_all(&[size as u8])?;
    } else if size <= 0xFFFF {
        writer.write_all(&[253])?;
        writer.write_all(&(size as u16).to_le_bytes())?;
    } else if size <= 0xFFFF_FFFF {
        writer.write_all(&[254])?;
        writer.write_all(&(size as u32).to_le_bytes())?;
    } else {
        writer.write_all(&[255])?;
        writer.write_all(&size.to_le_bytes())?;
    }
    Ok(())
}

/// Reads a compact size. Non-canonical encodings are accepted.
pub fn read_compact_size<R: Read>(cursor: &mut BinaryCursor<R>) -> Result<u64> {
    match cursor.read_u8()? {
        253 => cursor.read_u16_le().map(u64::from),
        254 => cursor.read_u32_le().map(u64::from),
        255 => cursor.read_u64_le(),
        n => Ok(u64::from(n)),
    }
}

/// Writes `n` in the MSB-first base-128 encoding used for coin codes and compressed
/// amounts, where every continuation byte carries an implicit `+1`.
///
// https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/serialize.h#L440
pub fn write_varint<W: Write>(writer: &mut W, mut n: u64) -> io::Result<()> {
    let mut tmp = [0u8; 10];
    let mut len = 0;
    loop {
        tmp[len] = (n & 0x7F) as u8 | if len > 0 { 0x80 } else { 0x00 };
        if n <= 0x7F {
            break;
        }
        n = (n >> 7) - 1;
        len += 1;
    }
    tmp[..=len].reverse();
    writer.write_all(&tmp[..=len])
}

/// Reads a value written by [`write_varint`].
pub fn read_varint<R: Read>(cursor: &mut BinaryCursor<R>) -> Result<u64> {
    let mut n: u64 = 0;
    loop {
        let position = cursor.position();
        let byte = cursor.read_u8()?;
        if n > (u64::MAX >> 7) {
            return Err(Error::VarIntOverflow { position });
        }
        n = (n << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(n);
        }
        n = n
            .checked_add(1)
            .ok_or(Error::VarIntOverflow { position })?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor(data: &[u8]) -> BinaryCursor<Cursor<Vec<u8>>> {
        BinaryCursor::new(Cursor::new(data.to_vec()), data.len() as u64, 16)
    }

    fn varint_bytes(n: u64) -> Vec<u8> {
        let mut data = Vec::new();
        write_varint(&mut data, n).unwrap();
        data
    }

    #[test]
    fn varint_known_encodings() {
        // Vectors from Bitcoin Core's serialize_tests.
        assert_eq!(varint_bytes(0), [0x00]);
        assert_eq!(varint_bytes(0x7f), [0x7f]);
        assert_eq!(varint_bytes(0x80), [0x80, 0x00]);
        assert_eq!(varint_bytes(0x1234), [0xa3, 0x34]);
        assert_eq!(varint_bytes(0xffff), [0x82, 0xfe, 0x7f]);
        assert_eq!(varint_bytes(0x123456), [0xc7, 0xe7, 0x56]);
        assert_eq!(varint_bytes(0x80123456), [0x86, 0xff, 0xc7, 0xe7, 0x56]);
        assert_eq!(
            varint_bytes(u64::MAX),
            [0x80, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0x7f]
        );
    }

    #[test]
    fn varint_decoding() {
        assert_eq!(read_varint(&mut cursor(&[0x00])).unwrap(), 0);
        assert_eq!(read_varint(&mut cursor(&[0x80, 0x00])).unwrap(), 0x80);
        assert_eq!(read_varint(&mut cursor(&[0x80, 0x0f])).unwrap(), 143);
        assert_eq!(read_varint(&mut cursor(&[0xa3, 0x34])).unwrap(), 0x1234);

        for _ in 0..1000 {
            let n = fastrand::u64(..);
            let data = varint_bytes(n);
            let mut cursor = cursor(&data);
            assert_eq!(read_varint(&mut cursor).unwrap(), n);
            assert!(cursor.at_end());
        }
    }

    #[test]
    fn varint_overflow() {
        let data = [0xff; 11];
        assert!(matches!(
            read_varint(&mut cursor(&data)),
            Err(Error::VarIntOverflow { .. })
        ));
    }

    #[test]
    fn varint_truncated() {
        assert!(matches!(
            read_varint(&mut cursor(&[0x80])),
            Err(Error::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn compact_size() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (252, &[0xfc]),
            (253, &[0xfd, 0xfd, 0x00]),
            (0xffff, &[0xfd, 0xff, 0xff]),
            (0x10000, &[0xfe, 0x00, 0x00, 0x01, 0x00]),
            (
                0x1_0000_0000,
                &[0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            ),
        ];

        for (n, expected) in cases {
            let mut data = Vec::new();
            write_compact_size(&mut data, n).unwrap();
            assert_eq!(data, expected);
            assert_eq!(read_compact_size(&mut cursor(expected)).unwrap(), n);
        }
    }
}
