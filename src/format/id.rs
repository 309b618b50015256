//! Compact, URL-safe opaque ids: signed base-62 over `0-9a-zA-Z`.

const DIGITS: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RADIX: i64 = 62;

pub fn encode_id(value: i64) -> String {
    // Accumulate on the negative side: |i64::MIN| has no positive counterpart.
    let negative = value < 0;
    let mut n = if negative { value } else { -value };
    let mut reversed = Vec::with_capacity(12);

    while n <= -RADIX {
        reversed.push(DIGITS[(-(n % RADIX)) as usize]);
        n /= RADIX;
    }
    reversed.push(DIGITS[(-n) as usize]);
    if negative {
        reversed.push(b'-');
    }

    reversed.iter().rev().map(|&b| char::from(b)).collect()
}

/// Inverse of [`encode_id`]. `None` for empty, malformed or out-of-range input.
pub fn decode_id(id: &str) -> Option<i64> {
    let (negative, digits) = match id.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, id),
    };
    if digits.is_empty() {
        return None;
    }

    let mut n: i64 = 0;
    for b in digits.bytes() {
        let digit = DIGITS.iter().position(|&d| d == b)? as i64;
        n = n.checked_mul(RADIX)?.checked_sub(digit)?;
    }

    if negative { Some(n) } else { n.checked_neg() }
}
