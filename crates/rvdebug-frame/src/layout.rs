/// Sentinel byte that opens every target-to-host frame.
pub const MAGIC: u8 = 0xD0;

/// Frame header: sentinel (1) + dump type (1) + flags (1) + pad (1).
pub const HEADER_SIZE: usize = 4;

/// Size of the captured program counter.
pub const PC_SIZE: usize = 4;

/// Number of packed pipeline-latch words in the pipeline-debug variant.
pub const PIPE_WORDS: usize = 23;

/// Number of general-purpose registers (x0..x31).
pub const REG_COUNT: usize = 32;

/// Default size of the data-memory window appended to each frame.
pub const DEFAULT_MEM_DUMP_BYTES: usize = 64;

/// Largest data-memory window a layout may carry (1 MiB).
pub const MAX_MEM_DUMP_BYTES: usize = 1 << 20;

use crate::error::{FrameError, Result};

/// Which frame layout the target's debug unit was synthesized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVariant {
    /// Header, PC, registers, memory.
    Basic,
    /// Header, PC, 23 pipeline-latch words, registers, memory.
    #[default]
    WithPipeline,
}

impl ProtocolVariant {
    /// Number of pipeline words carried by this variant.
    pub const fn pipeline_words(self) -> usize {
        match self {
            ProtocolVariant::Basic => 0,
            ProtocolVariant::WithPipeline => PIPE_WORDS,
        }
    }
}

/// Connection-time frame geometry.
///
/// Wire format:
/// ```text
/// ┌──────┬──────┬───────┬─────┬──────────┬───────────────┬─────────────┬──────────┐
/// │ 0xD0 │ type │ flags │ pad │ PC (LE)  │ pipeline      │ x0..x31     │ memory   │
/// │ 1B   │ 1B   │ 1B    │ 1B  │ 4B       │ 23×4B or none │ 32×4B (LE)  │ N bytes  │
/// └──────┴──────┴───────┴─────┴──────────┴───────────────┴─────────────┴──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Protocol variant (presence of the pipeline block).
    pub variant: ProtocolVariant,
    /// Number of data-memory bytes the target appends to each frame.
    pub mem_dump_bytes: usize,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            variant: ProtocolVariant::default(),
            mem_dump_bytes: DEFAULT_MEM_DUMP_BYTES,
        }
    }
}

impl FrameLayout {
    /// Create a layout for an explicit variant and memory window.
    pub const fn new(variant: ProtocolVariant, mem_dump_bytes: usize) -> Self {
        Self {
            variant,
            mem_dump_bytes,
        }
    }

    /// Create a layout, rejecting memory windows above
    /// [`MAX_MEM_DUMP_BYTES`].
    pub fn checked(variant: ProtocolVariant, mem_dump_bytes: usize) -> Result<Self> {
        let layout = Self::new(variant, mem_dump_bytes);
        layout.validate()?;
        Ok(layout)
    }

    /// Fail if the memory window is larger than [`MAX_MEM_DUMP_BYTES`].
    pub fn validate(&self) -> Result<()> {
        if self.mem_dump_bytes > MAX_MEM_DUMP_BYTES {
            return Err(FrameError::LayoutTooLarge {
                mem_dump_bytes: self.mem_dump_bytes,
                max: MAX_MEM_DUMP_BYTES,
            });
        }
        Ok(())
    }

    /// Offset of the first pipeline word (or of the registers in `Basic`).
    pub const fn pipeline_offset(&self) -> usize {
        HEADER_SIZE + PC_SIZE
    }

    /// Offset of register x0.
    pub const fn registers_offset(&self) -> usize {
        self.pipeline_offset() + self.variant.pipeline_words() * 4
    }

    /// Offset of the first memory byte.
    pub const fn memory_offset(&self) -> usize {
        self.registers_offset() + REG_COUNT * 4
    }

    /// Total frame length on the wire, sentinel included.
    ///
    /// Saturates for windows no real layout can hold; [`FrameLayout::validate`]
    /// rejects those before any buffer is sized from this.
    pub const fn frame_len(&self) -> usize {
        self.memory_offset().saturating_add(self.mem_dump_bytes)
    }
}
