use std::slice;

use crate::error::{ImageError, Result};

/// Ordered `(address, word)` pairs to write into instruction memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    words: Vec<(u32, u32)>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive words starting at `base`, one every 4 bytes.
    ///
    /// Fails with `EmptyProgram` when `words` is empty.
    pub fn sequence(base: u32, words: &[u32]) -> Result<Self> {
        if words.is_empty() {
            return Err(ImageError::EmptyProgram);
        }
        let mut image = Self::new();
        let mut addr = base;
        for &word in words {
            image.push(addr, word);
            addr = addr.wrapping_add(4);
        }
        Ok(image)
    }

    /// Append one pair; duplicates are kept.
    pub fn push(&mut self, addr: u32, word: u32) {
        self.words.push((addr, word));
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, (u32, u32)> {
        self.words.iter()
    }

    pub fn as_slice(&self) -> &[(u32, u32)] {
        &self.words
    }

    /// Lowest and highest address touched, if any.
    pub fn address_span(&self) -> Option<(u32, u32)> {
        let lo = self.words.iter().map(|&(addr, _)| addr).min()?;
        let hi = self.words.iter().map(|&(addr, _)| addr).max()?;
        Some((lo, hi))
    }

    /// Return `self` unless it holds no words.
    pub fn non_empty(self) -> Result<Self> {
        if self.is_empty() {
            Err(ImageError::EmptyProgram)
        } else {
            Ok(self)
        }
    }
}

impl From<Vec<(u32, u32)>> for ProgramImage {
    fn from(words: Vec<(u32, u32)>) -> Self {
        Self { words }
    }
}

impl<'a> IntoIterator for &'a ProgramImage {
    type Item = &'a (u32, u32);
    type IntoIter = slice::Iter<'a, (u32, u32)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
