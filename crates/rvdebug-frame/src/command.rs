use std::fmt;

use bytes::{BufMut, BytesMut};

/// Host-to-target debug commands.
///
/// All commands are single ASCII bytes except `ProgramWord`, which is followed
/// by a little-endian address and data word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `D`: capture a manual snapshot.
    Dump,
    /// `S`: execute one instruction, then dump.
    Step,
    /// `G`: run until halt, then dump.
    Run,
    /// `R`: reset the fetch stage (no reply).
    ResetFetch,
    /// `P`: write one word of instruction memory (no reply).
    ProgramWord { addr: u32, data: u32 },
}

impl Command {
    /// Opcode byte that starts this command on the wire.
    pub const fn opcode(&self) -> u8 {
        match self {
            Command::Dump => b'D',
            Command::Step => b'S',
            Command::Run => b'G',
            Command::ResetFetch => b'R',
            Command::ProgramWord { .. } => b'P',
        }
    }

    /// Whether the target answers this command with a frame.
    pub const fn expects_frame(&self) -> bool {
        matches!(self, Command::Dump | Command::Step | Command::Run)
    }

    /// Number of bytes this command occupies on the wire.
    pub const fn encoded_len(&self) -> usize {
        match self {
            Command::ProgramWord { .. } => 9,
            _ => 1,
        }
    }

    /// Short lowercase name, used in logs and CLI output.
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Dump => "dump",
            Command::Step => "step",
            Command::Run => "run",
            Command::ResetFetch => "reset",
            Command::ProgramWord { .. } => "program",
        }
    }

    /// Append the wire encoding to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u8(self.opcode());
        if let Command::ProgramWord { addr, data } = *self {
            dst.put_u32_le(addr);
            dst.put_u32_le(data);
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::ProgramWord { addr, data } => {
                write!(f, "program [0x{addr:08x}] <= 0x{data:08x}")
            }
            other => f.write_str(other.name()),
        }
    }
}
