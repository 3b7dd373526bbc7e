use std::path::PathBuf;

/// Errors that can occur while building a program image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// A numeric token could not be parsed. `line` is 1-based; 0 means the
    /// token did not come from a file.
    #[error("malformed number {token:?} on line {line}")]
    MalformedNumber { line: usize, token: String },

    /// The image holds no words to program.
    #[error("program has no words to load")]
    EmptyProgram,

    /// The program file could not be read.
    #[error("failed to read program file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ImageError>;
