/// Maximum number of satoshis that can ever exist.
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

// https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/compressor.cpp#L140
//
// NOTE: the encoding is only canonical for 0 <= n <= MAX_MONEY, larger amounts are still
// encoded but never produced by a valid chain.
pub fn compress_amount(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut e = 0;
    let mut n = n;
    while n % 10 == 0 && e < 9 {
        n /= 10;
        e += 1;
    }
    if e < 9 {
        let d = n % 10;
        n /= 10;
        1 + (n * 9 + d - 1) * 10 + e
    } else {
        1 + (n - 1) * 10 + 9
    }
}

/// Returns `None` if the decoded amount does not fit in 64 bits.
pub fn decompress_amount(x: u64) -> Option<u64> {
    if x == 0 {
        return Some(0);
    }
    let mut x = x - 1;
    let e = x % 10;
    x /= 10;
    let mut n = if e < 9 {
        let d = (x % 9) + 1;
        x /= 9;
        x * 10 + d
    } else {
        x + 1
    };
    for _ in 0..e {
        n = n.checked_mul(10)?;
    }
    Some(n)
}
