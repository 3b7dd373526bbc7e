//! Debug wire protocol between the host and the soft-core RISC-V target.
//!
//! Every target-to-host frame is a fixed-layout snapshot:
//! - A 1-byte sentinel (`0xD0`) the host synchronizes on
//! - A 4-byte header (sentinel, dump type, flags, pad) and the PC
//! - Optionally 23 packed pipeline-latch words
//! - The 32-entry register file and a fixed-size data-memory window
//!
//! Host-to-target traffic is single ASCII command bytes, with `P` carrying an
//! address/data pair. No partial frames ever reach the caller.

pub mod codec;
pub mod command;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, signed32, DumpFlags, DumpType, Frame, PipelineWords, Snapshot};
pub use command::Command;
pub use error::{FrameError, ReadPhase, Result};
pub use layout::{
    FrameLayout, ProtocolVariant, DEFAULT_MEM_DUMP_BYTES, HEADER_SIZE, MAGIC,
    MAX_MEM_DUMP_BYTES, PIPE_WORDS, REG_COUNT,
};
pub use pipeline::{
    decode_pipeline, ExMemControl, ExMemLatch, IdExControl, IdExLatch, IfIdLatch, MemWbControl,
    MemWbLatch, PipelineState,
};
pub use reader::{read_exact, sync_to_magic, FrameReader};
pub use writer::CommandWriter;
