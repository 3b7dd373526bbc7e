//! Program images for the target's instruction memory.
//!
//! An image is an ordered list of `(address, word)` pairs parsed from a
//! line-oriented text file (`.mem`, `.hex`, `.txt` by convention):
//!
//! ```text
//! @00000040          // set the running base address
//! 00000013           // word at the base, base advances by 4
//! 0x00100073
//! 00000100:DEADBEEF  # explicit address:data pair, base unchanged
//! ```
//!
//! Duplicate addresses are kept and replayed in file order.

pub mod error;
pub mod image;
pub mod number;
pub mod parser;

pub use error::{ImageError, Result};
pub use image::ProgramImage;
pub use number::{parse_hex_u32, parse_int_auto};
pub use parser::{parse_file, parse_str};
