//! Parsing of user-facing configuration values

use crate::error::LinkfetchError;

/// `k`/`K` multiplier (binary scale, kept for compatibility with existing link scripts)
pub const KILO: u64 = 2 << 10;
/// `m`/`M` multiplier
pub const MEGA: u64 = 2 << 20;

/// Parse a speed limit such as `1000`, `100k` or `5m` into bytes per second
///
/// `0` means unlimited.
pub fn parse_speed_limit(value: &str) -> Result<u64, LinkfetchError> {
    let invalid = || LinkfetchError::InvalidSpeedLimit(value.to_string());
    let trimmed = value.trim();

    let (digits, multiplier) = match trimmed.as_bytes().last() {
        Some(b'k' | b'K') => (&trimmed[..trimmed.len() - 1], KILO),
        Some(b'm' | b'M') => (&trimmed[..trimmed.len() - 1], MEGA),
        _ => (trimmed, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

/// Parse the number of concurrent fetches
pub fn parse_concurrency(value: &str) -> Result<usize, LinkfetchError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LinkfetchError::InvalidConcurrency(value.to_string()));
    }

    match trimmed.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(LinkfetchError::InvalidConcurrency(value.to_string())),
    }
}
