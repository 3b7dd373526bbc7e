use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{FrameError, Result};
use crate::layout::{FrameLayout, ProtocolVariant, MAGIC, PIPE_WORDS, REG_COUNT};
use crate::pipeline::PipelineState;

/// Why the target produced a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpType {
    /// After a single-step (`S`).
    Step,
    /// After a run (`G`) reached its end condition.
    RunEnd,
    /// On explicit request (`D`).
    Manual,
    /// Any other value the hardware sends.
    Unknown(u8),
}

impl From<u8> for DumpType {
    fn from(value: u8) -> Self {
        match value {
            1 => DumpType::Step,
            2 => DumpType::RunEnd,
            3 => DumpType::Manual,
            other => DumpType::Unknown(other),
        }
    }
}

impl From<DumpType> for u8 {
    fn from(value: DumpType) -> Self {
        match value {
            DumpType::Step => 1,
            DumpType::RunEnd => 2,
            DumpType::Manual => 3,
            DumpType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for DumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpType::Step => f.write_str("STEP"),
            DumpType::RunEnd => f.write_str("RUN_END"),
            DumpType::Manual => f.write_str("MANUAL"),
            DumpType::Unknown(n) => write!(f, "UNKNOWN({n})"),
        }
    }
}

/// Status flags byte of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DumpFlags(u8);

impl DumpFlags {
    /// The pipeline reached a halt condition.
    pub const HALT_SEEN: u8 = 1 << 0;
    /// No instruction is in flight in any latch.
    pub const PIPE_EMPTY: u8 = 1 << 1;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw byte, reserved bits included.
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn halt_seen(self) -> bool {
        self.0 & Self::HALT_SEEN != 0
    }

    pub const fn pipe_empty(self) -> bool {
        self.0 & Self::PIPE_EMPTY != 0
    }
}

/// Fields common to both protocol variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub dump_type: DumpType,
    pub flags: DumpFlags,
    /// Reserved header byte, kept so a frame re-encodes byte-for-byte.
    pub pad: u8,
    pub pc: u32,
    /// x0..x31.
    pub registers: [u32; REG_COUNT],
    /// Data memory starting at address 0.
    pub memory: Bytes,
}

/// The 23 raw pipeline-latch words of a pipeline-debug frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineWords(pub [u32; PIPE_WORDS]);

impl PipelineWords {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Decode the packed latch state.
    pub fn decode(&self) -> PipelineState {
        PipelineState::from_words(&self.0)
    }
}

/// One decoded target snapshot.
///
/// The variant is fixed by the connection's [`FrameLayout`], never inferred
/// from the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Basic(Snapshot),
    WithPipeline {
        snapshot: Snapshot,
        pipeline: PipelineWords,
    },
}

impl Frame {
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            Frame::Basic(snapshot) | Frame::WithPipeline { snapshot, .. } => snapshot,
        }
    }

    pub fn variant(&self) -> ProtocolVariant {
        match self {
            Frame::Basic(_) => ProtocolVariant::Basic,
            Frame::WithPipeline { .. } => ProtocolVariant::WithPipeline,
        }
    }

    /// Raw pipeline words, if this frame carries them.
    pub fn pipeline_words(&self) -> Option<&PipelineWords> {
        match self {
            Frame::Basic(_) => None,
            Frame::WithPipeline { pipeline, .. } => Some(pipeline),
        }
    }

    /// Decoded pipeline state, if this frame carries pipeline words.
    pub fn pipeline(&self) -> Option<PipelineState> {
        self.pipeline_words().map(PipelineWords::decode)
    }

    /// The layout this frame was (or would be) transmitted with.
    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(self.variant(), self.snapshot().memory.len())
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        self.layout().frame_len()
    }
}

/// Two's-complement view of a 32-bit register value.
pub const fn signed32(value: u32) -> i32 {
    value as i32
}

/// Decode one complete frame buffer, sentinel included.
///
/// The buffer must be exactly `layout.frame_len()` bytes. Decoding is
/// all-or-nothing: either every field is extracted or an error is returned.
pub fn decode_frame(buf: &[u8], layout: &FrameLayout) -> Result<Frame> {
    let expected = layout.frame_len();
    if buf.len() != expected {
        return Err(FrameError::FrameIncomplete {
            expected,
            actual: buf.len(),
        });
    }

    let mut src = buf;
    let magic = src.get_u8();
    if magic != MAGIC {
        return Err(FrameError::InvalidMagic { found: magic });
    }

    let dump_type = DumpType::from(src.get_u8());
    let flags = DumpFlags::from_bits(src.get_u8());
    let pad = src.get_u8();
    let pc = src.get_u32_le();

    let pipeline = match layout.variant {
        ProtocolVariant::Basic => None,
        ProtocolVariant::WithPipeline => {
            let mut words = [0u32; PIPE_WORDS];
            for word in words.iter_mut() {
                *word = src.get_u32_le();
            }
            Some(PipelineWords(words))
        }
    };

    let mut registers = [0u32; REG_COUNT];
    for reg in registers.iter_mut() {
        *reg = src.get_u32_le();
    }

    let memory = Bytes::copy_from_slice(src);

    debug!(
        %dump_type,
        flags = flags.bits(),
        pc = format_args!("0x{pc:08x}"),
        "decoded frame"
    );

    let snapshot = Snapshot {
        dump_type,
        flags,
        pad,
        pc,
        registers,
        memory,
    };

    Ok(match pipeline {
        None => Frame::Basic(snapshot),
        Some(pipeline) => Frame::WithPipeline { snapshot, pipeline },
    })
}

/// Encode a frame into its exact wire bytes.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    let snapshot = frame.snapshot();
    dst.reserve(frame.wire_size());
    dst.put_u8(MAGIC);
    dst.put_u8(snapshot.dump_type.into());
    dst.put_u8(snapshot.flags.bits());
    dst.put_u8(snapshot.pad);
    dst.put_u32_le(snapshot.pc);
    if let Some(pipeline) = frame.pipeline_words() {
        for word in pipeline.0 {
            dst.put_u32_le(word);
        }
    }
    for reg in snapshot.registers {
        dst.put_u32_le(reg);
    }
    dst.put_slice(&snapshot.memory);
}
