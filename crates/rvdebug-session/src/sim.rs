//! A simulated debug target speaking the wire protocol.
//!
//! It does not execute RISC-V: a step only advances the PC, and `EBREAK` at
//! the PC halts it. That is enough to drive a session end to end without an
//! FPGA, over a socket pair or a Unix socket bridge.

use std::collections::BTreeMap;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use rvdebug_frame::{
    encode_frame, DumpFlags, DumpType, Frame, FrameLayout, PipelineWords, ProtocolVariant,
    Snapshot, PIPE_WORDS, REG_COUNT,
};
use tracing::{debug, warn};

/// `ebreak`; halts the simulated core.
pub const EBREAK: u32 = 0x0010_0073;

/// `addi x0, x0, 0`; what unprogrammed instruction memory reads as.
pub const NOP: u32 = 0x0000_0013;

/// Upper bound on steps taken by one `G` when no `EBREAK` is reached.
const RUN_STEP_LIMIT: usize = 4096;

/// State of the simulated core.
#[derive(Debug, Clone)]
pub struct SimTarget {
    pub layout: FrameLayout,
    pub pc: u32,
    pub registers: [u32; REG_COUNT],
    /// Data memory window reported in each frame.
    pub memory: Vec<u8>,
    /// Instruction memory as written by `P` commands.
    pub imem: BTreeMap<u32, u32>,
    pub halted: bool,
    /// Every `P` command received, in order.
    pub program_log: Vec<(u32, u32)>,
    /// Commands received, opcode bytes in order.
    pub command_log: Vec<u8>,
}

impl SimTarget {
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            layout,
            pc: 0,
            registers: [0; REG_COUNT],
            memory: vec![0; layout.mem_dump_bytes],
            imem: BTreeMap::new(),
            halted: false,
            program_log: Vec::new(),
            command_log: Vec::new(),
        }
    }

    /// Instruction at `addr`.
    pub fn instruction_at(&self, addr: u32) -> u32 {
        self.imem.get(&addr).copied().unwrap_or(NOP)
    }

    /// Execute one instruction slot.
    pub fn step(&mut self) {
        if self.halted {
            return;
        }
        if self.instruction_at(self.pc) == EBREAK {
            self.halted = true;
        } else {
            self.pc = self.pc.wrapping_add(4);
        }
    }

    /// Step until halted or the run limit is reached.
    pub fn run(&mut self) {
        for _ in 0..RUN_STEP_LIMIT {
            if self.halted {
                break;
            }
            self.step();
        }
    }

    /// Return to the reset vector and clear the halt state.
    pub fn reset_fetch(&mut self) {
        self.pc = 0;
        self.halted = false;
    }

    /// The frame this target would send for `dump_type` right now.
    pub fn snapshot(&self, dump_type: DumpType) -> Frame {
        let mut flags = 0;
        if self.halted {
            flags |= DumpFlags::HALT_SEEN | DumpFlags::PIPE_EMPTY;
        }
        let mut registers = self.registers;
        registers[0] = 0;

        let mut memory = self.memory.clone();
        memory.resize(self.layout.mem_dump_bytes, 0);

        let snapshot = Snapshot {
            dump_type,
            flags: DumpFlags::from_bits(flags),
            pad: 0,
            pc: self.pc,
            registers,
            memory: memory.into(),
        };
        match self.layout.variant {
            ProtocolVariant::Basic => Frame::Basic(snapshot),
            ProtocolVariant::WithPipeline => Frame::WithPipeline {
                snapshot,
                pipeline: self.pipeline_words(),
            },
        }
    }

    /// Only the IF/ID latch is populated: the fetched instruction at the PC.
    fn pipeline_words(&self) -> PipelineWords {
        let mut words = [0u32; PIPE_WORDS];
        words[0] = self.pc;
        words[1] = self.pc.wrapping_add(4);
        words[2] = self.instruction_at(self.pc);
        words[3] = u32::from(!self.halted);
        PipelineWords(words)
    }

    /// Apply one command; returns the reply frame, if the command has one.
    pub fn handle(&mut self, opcode: u8, operands: Option<(u32, u32)>) -> Option<Frame> {
        self.command_log.push(opcode);
        match opcode {
            b'D' => Some(self.snapshot(DumpType::Manual)),
            b'S' => {
                self.step();
                Some(self.snapshot(DumpType::Step))
            }
            b'G' => {
                self.run();
                Some(self.snapshot(DumpType::RunEnd))
            }
            b'R' => {
                self.reset_fetch();
                None
            }
            b'P' => {
                if let Some((addr, data)) = operands {
                    self.imem.insert(addr, data);
                    self.program_log.push((addr, data));
                }
                None
            }
            other => {
                warn!(opcode = other, "simulated target ignoring unknown command byte");
                None
            }
        }
    }

    /// Serve commands from `stream` until the host closes it.
    pub fn serve<S: Read + Write>(&mut self, stream: &mut S) -> io::Result<()> {
        self.serve_until(stream, &AtomicBool::new(true))
    }

    /// Serve commands until the host closes `stream` or `running` is cleared.
    ///
    /// `running` is checked whenever a read times out, so give `stream` a
    /// read timeout for prompt shutdown.
    pub fn serve_until<S: Read + Write>(
        &mut self,
        stream: &mut S,
        running: &AtomicBool,
    ) -> io::Result<()> {
        let mut opcode = [0u8; 1];
        let mut buf = BytesMut::new();
        loop {
            if !fill(stream, &mut opcode, running)? {
                return Ok(());
            }

            let operands = if opcode[0] == b'P' {
                let mut raw = [0u8; 8];
                if !fill(stream, &mut raw, running)? {
                    warn!("host went away in the middle of a program command");
                    return Ok(());
                }
                let addr = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                let data = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
                Some((addr, data))
            } else {
                None
            };

            if let Some(frame) = self.handle(opcode[0], operands) {
                buf.clear();
                encode_frame(&frame, &mut buf);
                stream.write_all(&buf)?;
                stream.flush()?;
                debug!(pc = self.pc, bytes = buf.len(), "simulated target sent frame");
            }
        }
    }
}

/// Fill `buf` completely. Returns `false` on end of stream or once `running`
/// is cleared; read timeouts are retried.
fn fill<S: Read>(stream: &mut S, buf: &mut [u8], running: &AtomicBool) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        if !running.load(Ordering::SeqCst) {
            return Ok(false);
        }
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_advances_until_ebreak() {
        let mut target = SimTarget::new(FrameLayout::default());
        target.imem.insert(8, EBREAK);

        target.step();
        target.step();
        assert_eq!(target.pc, 8);
        assert!(!target.halted);

        target.step();
        assert_eq!(target.pc, 8);
        assert!(target.halted);
    }

    #[test]
    fn run_stops_at_limit_without_ebreak() {
        let mut target = SimTarget::new(FrameLayout::default());
        target.run();
        assert_eq!(target.pc, (RUN_STEP_LIMIT * 4) as u32);
        assert!(!target.halted);
    }

    #[test]
    fn snapshot_reflects_halt_and_variant() {
        let mut target = SimTarget::new(FrameLayout::new(ProtocolVariant::Basic, 8));
        target.registers[0] = 99;
        target.halted = true;

        let frame = target.snapshot(DumpType::RunEnd);
        assert!(matches!(frame, Frame::Basic(_)));
        let snapshot = frame.snapshot();
        assert!(snapshot.flags.halt_seen());
        assert!(snapshot.flags.pipe_empty());
        assert_eq!(snapshot.registers[0], 0);
        assert_eq!(snapshot.memory.len(), 8);
    }

    #[test]
    fn pipeline_shows_fetched_instruction() {
        let mut target = SimTarget::new(FrameLayout::default());
        target.pc = 0x20;
        target.imem.insert(0x20, 0x0050_0093);

        let state = target.snapshot(DumpType::Manual).pipeline().unwrap();
        assert_eq!(state.if_id.pc, 0x20);
        assert_eq!(state.if_id.pc_plus4, 0x24);
        assert_eq!(state.if_id.instr, 0x0050_0093);
        assert!(state.if_id.valid);
    }

    #[test]
    fn program_and_reset_commands() {
        let mut target = SimTarget::new(FrameLayout::default());
        target.pc = 0x40;
        target.halted = true;

        assert!(target.handle(b'P', Some((0x0, EBREAK))).is_none());
        assert!(target.handle(b'R', None).is_none());
        assert_eq!(target.pc, 0);
        assert!(!target.halted);
        assert_eq!(target.program_log, vec![(0, EBREAK)]);
        assert_eq!(target.command_log, b"PR".to_vec());
    }

    #[cfg(unix)]
    #[test]
    fn serve_until_stops_while_host_stays_connected() {
        use std::os::unix::net::UnixStream;
        use std::sync::Arc;
        use std::time::{Duration, Instant};

        let (host, mut remote) = UnixStream::pair().unwrap();
        remote
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let server = std::thread::spawn(move || {
            let mut target = SimTarget::new(FrameLayout::default());
            target.serve_until(&mut remote, &flag).map(|()| target)
        });

        std::thread::sleep(Duration::from_millis(60));
        let stopped_at = Instant::now();
        running.store(false, Ordering::SeqCst);
        let target = server.join().unwrap().unwrap();
        assert!(stopped_at.elapsed() < Duration::from_secs(1));
        assert!(target.command_log.is_empty());
        drop(host);
    }

    #[cfg(unix)]
    #[test]
    fn program_operands_survive_read_timeouts() {
        use std::os::unix::net::UnixStream;
        use std::time::Duration;

        let (mut host, mut remote) = UnixStream::pair().unwrap();
        remote
            .set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        let server = std::thread::spawn(move || {
            let mut target = SimTarget::new(FrameLayout::default());
            target.serve(&mut remote).map(|()| target)
        });

        host.write_all(&[b'P', 0x10, 0, 0, 0]).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        host.write_all(&EBREAK.to_le_bytes()).unwrap();
        drop(host);

        let target = server.join().unwrap().unwrap();
        assert_eq!(target.program_log, vec![(0x10, EBREAK)]);
    }
}
