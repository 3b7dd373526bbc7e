//! Integer literals as they appear in program files and on the command line.
//!
//! Values are reduced modulo 2^32, so over-wide literals keep their low 32
//! bits and negative literals wrap to two's complement.

/// Parse a hex literal with an optional `0x`/`0X` prefix.
pub fn parse_hex_u32(token: &str) -> Option<u32> {
    let (negative, body) = split_sign(token.trim());
    let digits = strip_prefix_ci(body, "0x").unwrap_or(body);
    finish(negative, parse_digits(digits, 16)?)
}

/// Parse an integer literal whose radix is chosen by its prefix:
/// `0x` hex, `0o` octal, `0b` binary, otherwise decimal.
///
/// A decimal literal with a leading zero (`017`) is rejected so it is not
/// silently read as something other than what was meant.
pub fn parse_int_auto(token: &str) -> Option<u32> {
    let (negative, body) = split_sign(token.trim());
    let value = if let Some(digits) = strip_prefix_ci(body, "0x") {
        parse_digits(digits, 16)?
    } else if let Some(digits) = strip_prefix_ci(body, "0o") {
        parse_digits(digits, 8)?
    } else if let Some(digits) = strip_prefix_ci(body, "0b") {
        parse_digits(digits, 2)?
    } else {
        if body.len() > 1 && body.starts_with('0') && body.bytes().any(|b| b != b'0' && b != b'_')
        {
            return None;
        }
        parse_digits(body, 10)?
    };
    finish(negative, value)
}

fn split_sign(token: &str) -> (bool, &str) {
    if let Some(rest) = token.strip_prefix('-') {
        (true, rest)
    } else {
        (false, token.strip_prefix('+').unwrap_or(token))
    }
}

fn strip_prefix_ci<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    let head = token.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &token[prefix.len()..])
}

fn finish(negative: bool, value: u32) -> Option<u32> {
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Accumulate digits modulo 2^32. Single underscores between digits are
/// accepted as separators.
fn parse_digits(digits: &str, radix: u32) -> Option<u32> {
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') {
        return None;
    }
    if digits.contains("__") {
        return None;
    }

    let mut value = 0u32;
    for ch in digits.chars().filter(|&c| c != '_') {
        let digit = ch.to_digit(radix)?;
        value = value.wrapping_mul(radix).wrapping_add(digit);
    }
    Some(value)
}
