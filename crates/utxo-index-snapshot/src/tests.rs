use super::*;
use hex_literal::hex;
use std::io::Cursor;

const MAINNET_MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

fn block_hash1() -> BlockHash {
    "00000000839a8e6886ab5951d76f411475428afc90947ee320161bbf18eb6048"
        .parse()
        .unwrap()
}

fn reader(data: Vec<u8>) -> Result<SnapshotReader<Cursor<Vec<u8>>>> {
    let len = data.len() as u64;
    SnapshotReader::new(BinaryCursor::new(Cursor::new(data), len, 16))
}

fn genesis_successor_coin() -> SnapshotEntry {
    let mut txid_wire = hex!("0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098");
    txid_wire.reverse();
    SnapshotEntry {
        txid_wire,
        vout: 0,
        coin: Coin {
            is_coinbase: true,
            amount: 50_0000_0000,
            height: 1,
            script_pubkey: hex!("410496b538e853519c726a2c91e61ec11600ae1390813a627c66fb8be7947be63c52da7589379515d4e0a604f8141781e62294721166bf621e73a82cbf2342c858eeac").to_vec(),
        },
    }
}

// Test data fetched via `bitcoin-cli -rpcclienttimeout=0 -named dumptxoutset 1_utxo.dat rollback=1`
#[rustfmt::skip]
const ONE_UTXO_SNAPSHOT: [u8; 120] = [
    0x75, 0x74, 0x78, 0x6f, 0xff, 0x02, 0x00, 0xf9, 0xbe, 0xb4, 0xd9, 0x48, 0x60, 0xeb, 0x18, 0xbf,
    0x1b, 0x16, 0x20, 0xe3, 0x7e, 0x94, 0x90, 0xfc, 0x8a, 0x42, 0x75, 0x14, 0x41, 0x6f, 0xd7, 0x51,
    0x59, 0xab, 0x86, 0x68, 0x8e, 0x9a, 0x83, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x98, 0x20, 0x51, 0xfd, 0x1e, 0x4b, 0xa7, 0x44, 0xbb, 0xbe, 0x68, 0x0e, 0x1f,
    0xee, 0x14, 0x67, 0x7b, 0xa1, 0xa3, 0xc3, 0x54, 0x0b, 0xf7, 0xb1, 0xcd, 0xb6, 0x06, 0xe8, 0x57,
    0x23, 0x3e, 0x0e, 0x01, 0x00, 0x03, 0x32, 0x04, 0x96, 0xb5, 0x38, 0xe8, 0x53, 0x51, 0x9c, 0x72,
    0x6a, 0x2c, 0x91, 0xe6, 0x1e, 0xc1, 0x16, 0x00, 0xae, 0x13, 0x90, 0x81, 0x3a, 0x62, 0x7c, 0x66,
    0xfb, 0x8b, 0xe7, 0x94, 0x7b, 0xe6, 0x3c, 0x52,
];

#[test]
fn test_header_serialization() {
    let header = SnapshotHeader::new(MAINNET_MAGIC, block_hash1(), 1);
    let mut data = Vec::new();
    header.serialize(&mut data).unwrap();

    assert_eq!(data.len(), 51);
    assert_eq!(data, ONE_UTXO_SNAPSHOT[..51]);

    let mut cursor = BinaryCursor::new(Cursor::new(data.clone()), data.len() as u64, 8);
    let decoded = SnapshotHeader::deserialize(&mut cursor).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(decoded.network(), SnapshotNetwork::Mainnet);
    assert!(cursor.at_end());
}

#[test]
fn test_snapshot_generation() {
    let data =
        generate_snapshot(Vec::new(), MAINNET_MAGIC, block_hash1(), [genesis_successor_coin()])
            .unwrap();
    assert_eq!(data, ONE_UTXO_SNAPSHOT);
}

#[test]
fn test_read_one_utxo_snapshot() {
    let mut reader = reader(ONE_UTXO_SNAPSHOT.to_vec()).unwrap();
    assert_eq!(reader.header().coins_count, 1);
    assert_eq!(reader.header().base_blockhash, block_hash1());

    let entry = reader.next_entry().unwrap().unwrap();
    assert_eq!(entry, genesis_successor_coin());
    assert_eq!(entry.coin.height, 1);

    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.group_complete());
    assert!(reader.at_end());
}

#[test]
fn test_grouped_entries() {
    let p2pkh = hex!("76a9140102030405060708090a0b0c0d0e0f101112131488ac").to_vec();
    let p2sh = hex!("a91400112233445566778899aabbccddeeff0011223387").to_vec();
    let mut entries = Vec::new();
    for (txid_byte, outputs) in [(0xaa, 3u32), (0x11, 1), (0x55, 2)] {
        for vout in (0..outputs).rev() {
            entries.push(SnapshotEntry {
                txid_wire: [txid_byte; 32],
                vout: vout * 2,
                coin: Coin {
                    is_coinbase: vout == 0,
                    amount: 1_000 + u64::from(vout),
                    height: 800_000 + vout,
                    script_pubkey: if vout % 2 == 0 { p2pkh.clone() } else { p2sh.clone() },
                },
            });
        }
    }

    let data = generate_snapshot(Vec::new(), MAINNET_MAGIC, block_hash1(), entries.clone()).unwrap();
    let mut reader = reader(data).unwrap();
    assert_eq!(reader.remaining(), 6);

    let mut decoded = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        decoded.push(entry);
    }
    assert!(reader.at_end());

    // Groups come out ordered by txid, outputs by index.
    entries.sort_by_key(|entry| (entry.txid_wire, entry.vout));
    assert_eq!(decoded, entries);
}

#[test]
fn test_invalid_magic() {
    let mut data = ONE_UTXO_SNAPSHOT.to_vec();
    data[4] = 0x00;
    assert!(matches!(reader(data), Err(Error::InvalidMagic(_))));
}

#[test]
fn test_unsupported_version() {
    let mut data = ONE_UTXO_SNAPSHOT.to_vec();
    data[5] = 0x03;
    assert!(matches!(reader(data), Err(Error::UnsupportedVersion(3))));
}

#[test]
fn test_truncated_entry() {
    let data = ONE_UTXO_SNAPSHOT[..ONE_UTXO_SNAPSHOT.len() - 4].to_vec();
    let mut reader = reader(data).unwrap();
    assert!(matches!(
        reader.next_entry(),
        Err(Error::UnexpectedEndOfInput { requested: 32, .. })
    ));
}

#[test]
fn test_output_index_overflow() {
    // Replace the single-byte output index with a compact size of 2^32.
    let mut data = ONE_UTXO_SNAPSHOT[..84].to_vec();
    data.extend_from_slice(&[0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
    data.extend_from_slice(&ONE_UTXO_SNAPSHOT[85..]);

    let mut reader = reader(data).unwrap();
    assert!(matches!(
        reader.next_entry(),
        Err(Error::OutputIndexOverflow(0x1_0000_0000))
    ));
}

#[test]
fn test_network_names() {
    let names = [
        ([0xf9, 0xbe, 0xb4, 0xd9], "Mainnet"),
        ([0x0b, 0x11, 0x09, 0x07], "Testnet3"),
        ([0x1c, 0x16, 0x3f, 0x28], "Testnet4"),
        ([0x0a, 0x03, 0xcf, 0x40], "Signet"),
        ([0xfa, 0xbf, 0xb5, 0xda], "Regtest"),
        ([0xde, 0xad, 0xbe, 0xef], "unknown network (deadbeef)"),
    ];

    for (magic, name) in names {
        assert_eq!(SnapshotNetwork::from_magic(magic).to_string(), name);
    }
}

#[test]
fn test_code() {
    let height = 733953u64;
    let code = height * 2;

    let mut data = Vec::new();
    write_varint(&mut data, code).unwrap();
    assert_eq!(data, [0xd8, 0xcb, 0x02]);

    let mut cursor = BinaryCursor::new(Cursor::new(data.clone()), data.len() as u64, 2);
    assert_eq!(read_varint(&mut cursor).unwrap() >> 1, height);
}
