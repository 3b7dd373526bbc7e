use std::path::Path;

use tracing::debug;

use crate::error::{ImageError, Result};
use crate::image::ProgramImage;
use crate::number::parse_hex_u32;

/// Parse a program file.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; they can only
/// ever appear inside comments of a well-formed file.
pub fn parse_file(path: &Path) -> Result<ProgramImage> {
    let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = parse_str(&String::from_utf8_lossy(&bytes))?;
    debug!(path = %path.display(), words = image.len(), "parsed program file");
    Ok(image)
}

/// Parse program text.
///
/// Each line, after dropping everything from `//` and then from `#`, is one of:
/// - `@ADDR`: set the running base address
/// - `ADDR:DATA`: one explicit pair; the base is left alone
/// - `WORD`: one word at the base, which then advances by 4
///
/// All numbers are hex with an optional `0x`. The first malformed token fails
/// the whole parse.
pub fn parse_str(text: &str) -> Result<ProgramImage> {
    let mut image = ProgramImage::new();
    let mut base = 0u32;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = strip_comment(raw);
        if content.is_empty() {
            continue;
        }

        if let Some(addr) = content.strip_prefix('@') {
            base = hex(addr, line)?;
        } else if let Some((addr, data)) = content.split_once(':') {
            image.push(hex(addr, line)?, hex(data, line)?);
        } else {
            image.push(base, hex(content, line)?);
            base = base.wrapping_add(4);
        }
    }

    Ok(image)
}

fn strip_comment(line: &str) -> &str {
    let line = line.split_once("//").map_or(line, |(head, _)| head);
    let line = line.split_once('#').map_or(line, |(head, _)| head);
    line.trim()
}

fn hex(token: &str, line: usize) -> Result<u32> {
    parse_hex_u32(token).ok_or_else(|| ImageError::MalformedNumber {
        line,
        token: token.trim().to_string(),
    })
}
