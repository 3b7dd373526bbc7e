//! Decoding of the packed pipeline-latch block.
//!
//! The debug unit snapshots the four inter-stage latches of the 5-stage
//! pipeline into 23 words. Data words are carried verbatim; register indices
//! and control signals are packed into a handful of words and extracted here
//! by fixed bit positions (LSB = bit 0). No sign extension is applied.
//!
//! | Word | Content                                                       |
//! |------|---------------------------------------------------------------|
//! | 0-3  | IF/ID: pc, pc+4, instr, valid (bit 0)                         |
//! | 4-8  | ID/EX: pc, pc+4, rs1 data, rs2 data, immediate                |
//! | 9    | ID/EX: funct7[31:25] funct3[24:22] rs2[21:17] rs1[16:12] rd[11:7] |
//! | 10   | ID/EX control                                                 |
//! | 11-14| EX/MEM: alu result, rs2 pass-through, branch target, pc+4     |
//! | 15   | EX/MEM: funct3[12:10] rd[9:5]                                 |
//! | 16   | EX/MEM control                                                |
//! | 17-19| MEM/WB: memory read data, alu result, pc+4                    |
//! | 20   | MEM/WB: rd[4:0]                                               |
//! | 21   | MEM/WB control                                                |
//! | 22   | reserved                                                      |

use serde::Serialize;

use crate::error::{FrameError, Result};
use crate::layout::PIPE_WORDS;

const W_IFID_PC: usize = 0;
const W_IFID_PC4: usize = 1;
const W_IFID_INSTR: usize = 2;
const W_IFID_VALID: usize = 3;

const W_IDEX_PC: usize = 4;
const W_IDEX_PC4: usize = 5;
const W_IDEX_RS1_DATA: usize = 6;
const W_IDEX_RS2_DATA: usize = 7;
const W_IDEX_IMM: usize = 8;
const W_IDEX_FIELDS: usize = 9;
const W_IDEX_CTRL: usize = 10;

const W_EXMEM_ALU: usize = 11;
const W_EXMEM_RS2: usize = 12;
const W_EXMEM_BRANCH_TARGET: usize = 13;
const W_EXMEM_PC4: usize = 14;
const W_EXMEM_FIELDS: usize = 15;
const W_EXMEM_CTRL: usize = 16;

const W_MEMWB_MEM_DATA: usize = 17;
const W_MEMWB_ALU: usize = 18;
const W_MEMWB_PC4: usize = 19;
const W_MEMWB_RD: usize = 20;
const W_MEMWB_CTRL: usize = 21;

const W_RESERVED: usize = 22;

/// Extract `width` bits starting at `shift`.
#[inline]
const fn field(word: u32, shift: u32, width: u32) -> u32 {
    (word >> shift) & ((1u32 << width) - 1)
}

#[inline]
const fn bit(word: u32, n: u32) -> bool {
    (word >> n) & 1 == 1
}

/// IF/ID latch (fetch → decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IfIdLatch {
    pub pc: u32,
    pub pc_plus4: u32,
    pub instr: u32,
    pub valid: bool,
}

/// ID/EX control signals (word 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IdExControl {
    pub valid: bool,
    pub reg_write: bool,
    pub mem_to_reg: bool,
    pub mem_read: bool,
    pub mem_write: bool,
    pub branch: bool,
    pub alu_src: bool,
    /// 2-bit ALU operation class, bits [8:7].
    pub alu_op: u8,
    pub jump: bool,
    pub jalr: bool,
    pub wb_sel_pc4: bool,
}

impl IdExControl {
    fn unpack(word: u32) -> Self {
        Self {
            valid: bit(word, 0),
            reg_write: bit(word, 1),
            mem_to_reg: bit(word, 2),
            mem_read: bit(word, 3),
            mem_write: bit(word, 4),
            branch: bit(word, 5),
            alu_src: bit(word, 6),
            alu_op: field(word, 7, 2) as u8,
            jump: bit(word, 9),
            jalr: bit(word, 10),
            wb_sel_pc4: bit(word, 11),
        }
    }
}

/// ID/EX latch (decode → execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IdExLatch {
    pub pc: u32,
    pub pc_plus4: u32,
    pub rs1_data: u32,
    pub rs2_data: u32,
    pub imm: u32,
    pub rs1: u8,
    pub rs2: u8,
    pub rd: u8,
    pub funct3: u8,
    pub funct7: u8,
    pub ctrl: IdExControl,
}

/// EX/MEM control signals (word 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExMemControl {
    pub valid: bool,
    pub reg_write: bool,
    pub mem_to_reg: bool,
    pub mem_read: bool,
    pub mem_write: bool,
    pub branch_taken: bool,
    pub wb_sel_pc4: bool,
}

impl ExMemControl {
    fn unpack(word: u32) -> Self {
        Self {
            valid: bit(word, 0),
            reg_write: bit(word, 1),
            mem_to_reg: bit(word, 2),
            mem_read: bit(word, 3),
            mem_write: bit(word, 4),
            branch_taken: bit(word, 5),
            wb_sel_pc4: bit(word, 6),
        }
    }
}

/// EX/MEM latch (execute → memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExMemLatch {
    pub alu_result: u32,
    pub rs2_pass: u32,
    pub branch_target: u32,
    pub pc_plus4: u32,
    pub rd: u8,
    pub funct3: u8,
    pub ctrl: ExMemControl,
}

/// MEM/WB control signals (word 21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemWbControl {
    pub valid: bool,
    pub reg_write: bool,
    pub mem_to_reg: bool,
    pub wb_sel_pc4: bool,
}

impl MemWbControl {
    fn unpack(word: u32) -> Self {
        Self {
            valid: bit(word, 0),
            reg_write: bit(word, 1),
            mem_to_reg: bit(word, 2),
            wb_sel_pc4: bit(word, 3),
        }
    }
}

/// MEM/WB latch (memory → writeback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemWbLatch {
    pub mem_read_data: u32,
    pub alu_result: u32,
    pub pc_plus4: u32,
    pub rd: u8,
    pub ctrl: MemWbControl,
}

/// Structured view over the 23 pipeline words of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PipelineState {
    pub if_id: IfIdLatch,
    pub id_ex: IdExLatch,
    pub ex_mem: ExMemLatch,
    pub mem_wb: MemWbLatch,
    /// Word 22, carried through uninterpreted.
    pub reserved: u32,
}

impl PipelineState {
    /// Decode a pipeline block of exactly [`PIPE_WORDS`] words.
    pub fn from_words(w: &[u32; PIPE_WORDS]) -> Self {
        let fields = w[W_IDEX_FIELDS];
        let exmem_fields = w[W_EXMEM_FIELDS];

        Self {
            if_id: IfIdLatch {
                pc: w[W_IFID_PC],
                pc_plus4: w[W_IFID_PC4],
                instr: w[W_IFID_INSTR],
                valid: bit(w[W_IFID_VALID], 0),
            },
            id_ex: IdExLatch {
                pc: w[W_IDEX_PC],
                pc_plus4: w[W_IDEX_PC4],
                rs1_data: w[W_IDEX_RS1_DATA],
                rs2_data: w[W_IDEX_RS2_DATA],
                imm: w[W_IDEX_IMM],
                funct7: field(fields, 25, 7) as u8,
                funct3: field(fields, 22, 3) as u8,
                rs2: field(fields, 17, 5) as u8,
                rs1: field(fields, 12, 5) as u8,
                rd: field(fields, 7, 5) as u8,
                ctrl: IdExControl::unpack(w[W_IDEX_CTRL]),
            },
            ex_mem: ExMemLatch {
                alu_result: w[W_EXMEM_ALU],
                rs2_pass: w[W_EXMEM_RS2],
                branch_target: w[W_EXMEM_BRANCH_TARGET],
                pc_plus4: w[W_EXMEM_PC4],
                funct3: field(exmem_fields, 10, 3) as u8,
                rd: field(exmem_fields, 5, 5) as u8,
                ctrl: ExMemControl::unpack(w[W_EXMEM_CTRL]),
            },
            mem_wb: MemWbLatch {
                mem_read_data: w[W_MEMWB_MEM_DATA],
                alu_result: w[W_MEMWB_ALU],
                pc_plus4: w[W_MEMWB_PC4],
                rd: field(w[W_MEMWB_RD], 0, 5) as u8,
                ctrl: MemWbControl::unpack(w[W_MEMWB_CTRL]),
            },
            reserved: w[W_RESERVED],
        }
    }

    /// One-line occupancy summary, e.g. `IF/ID v=1 | ID/EX v=0 | ...`.
    pub fn valid_summary(&self) -> String {
        format!(
            "IF/ID v={} | ID/EX v={} | EX/MEM v={} | MEM/WB v={}",
            u8::from(self.if_id.valid),
            u8::from(self.id_ex.ctrl.valid),
            u8::from(self.ex_mem.ctrl.valid),
            u8::from(self.mem_wb.ctrl.valid),
        )
    }
}

/// Decode a pipeline block of arbitrary length.
///
/// Fails with [`FrameError::LengthMismatch`] unless `words` holds exactly
/// [`PIPE_WORDS`] entries; the block is never padded or truncated.
pub fn decode_pipeline(words: &[u32]) -> Result<PipelineState> {
    let words: &[u32; PIPE_WORDS] =
        words
            .try_into()
            .map_err(|_| FrameError::LengthMismatch {
                expected: PIPE_WORDS,
                actual: words.len(),
            })?;
    Ok(PipelineState::from_words(words))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> [u32; PIPE_WORDS] {
        let mut w = [0u32; PIPE_WORDS];
        for (i, word) in w.iter_mut().enumerate() {
            *word = 0x1000_0000 + i as u32;
        }
        w
    }

    #[test]
    fn data_words_pass_through() {
        let w = words();
        let state = decode_pipeline(&w).unwrap();

        assert_eq!(state.if_id.pc, w[0]);
        assert_eq!(state.if_id.pc_plus4, w[1]);
        assert_eq!(state.if_id.instr, w[2]);
        assert_eq!(state.id_ex.pc, w[4]);
        assert_eq!(state.id_ex.pc_plus4, w[5]);
        assert_eq!(state.id_ex.rs1_data, w[6]);
        assert_eq!(state.id_ex.rs2_data, w[7]);
        assert_eq!(state.id_ex.imm, w[8]);
        assert_eq!(state.ex_mem.alu_result, w[11]);
        assert_eq!(state.ex_mem.rs2_pass, w[12]);
        assert_eq!(state.ex_mem.branch_target, w[13]);
        assert_eq!(state.ex_mem.pc_plus4, w[14]);
        assert_eq!(state.mem_wb.mem_read_data, w[17]);
        assert_eq!(state.mem_wb.alu_result, w[18]);
        assert_eq!(state.mem_wb.pc_plus4, w[19]);
        assert_eq!(state.reserved, w[22]);
    }

    #[test]
    fn idex_field_word_high_and_low_runs() {
        let mut w = [0u32; PIPE_WORDS];
        w[9] = 0xFE00_0F80;
        let state = decode_pipeline(&w).unwrap();

        assert_eq!(state.id_ex.funct7, 0x7F);
        assert_eq!(state.id_ex.funct3, 0);
        assert_eq!(state.id_ex.rs2, 0);
        assert_eq!(state.id_ex.rs1, 0);
        assert_eq!(state.id_ex.rd, 31);
    }

    #[test]
    fn idex_field_word_each_field_isolated() {
        let cases: [(u32, u8, u8, u8, u8, u8); 4] = [
            // word, funct7, funct3, rs2, rs1, rd
            (0x01C0_0000, 0, 7, 0, 0, 0),
            (0x003E_0000, 0, 0, 31, 0, 0),
            (0x0001_F000, 0, 0, 0, 31, 0),
            (0x4000_0000 | (5 << 22) | (2 << 17) | (3 << 12) | (10 << 7), 0x20, 5, 2, 3, 10),
        ];
        for (word, funct7, funct3, rs2, rs1, rd) in cases {
            let mut w = [0u32; PIPE_WORDS];
            w[9] = word;
            let id_ex = decode_pipeline(&w).unwrap().id_ex;
            assert_eq!(
                (id_ex.funct7, id_ex.funct3, id_ex.rs2, id_ex.rs1, id_ex.rd),
                (funct7, funct3, rs2, rs1, rd),
                "word 0x{word:08x}"
            );
        }
    }

    #[test]
    fn idex_field_word_ignores_low_bits() {
        let mut w = [0u32; PIPE_WORDS];
        // opcode bits [6:0] are not part of any field
        w[9] = 0x0000_007F;
        let id_ex = decode_pipeline(&w).unwrap().id_ex;
        assert_eq!((id_ex.rs1, id_ex.rs2, id_ex.rd), (0, 0, 0));
    }

    #[test]
    fn idex_control_bits() {
        let mut w = [0u32; PIPE_WORDS];
        // valid, mem_read, alu_src, alu_op=0b10, jalr
        w[10] = 0b1 | (1 << 3) | (1 << 6) | (0b10 << 7) | (1 << 10);
        let ctrl = decode_pipeline(&w).unwrap().id_ex.ctrl;

        assert_eq!(
            ctrl,
            IdExControl {
                valid: true,
                reg_write: false,
                mem_to_reg: false,
                mem_read: true,
                mem_write: false,
                branch: false,
                alu_src: true,
                alu_op: 2,
                jump: false,
                jalr: true,
                wb_sel_pc4: false,
            }
        );
    }

    #[test]
    fn idex_control_all_ones() {
        let mut w = [0u32; PIPE_WORDS];
        w[10] = u32::MAX;
        let ctrl = decode_pipeline(&w).unwrap().id_ex.ctrl;
        assert!(ctrl.valid && ctrl.reg_write && ctrl.mem_to_reg && ctrl.mem_read);
        assert!(ctrl.mem_write && ctrl.branch && ctrl.alu_src);
        assert!(ctrl.jump && ctrl.jalr && ctrl.wb_sel_pc4);
        assert_eq!(ctrl.alu_op, 3);
    }

    #[test]
    fn exmem_fields_and_control() {
        let mut w = [0u32; PIPE_WORDS];
        w[15] = (0b101 << 10) | (17 << 5) | 0x1F;
        w[16] = (1 << 1) | (1 << 4) | (1 << 5);
        let ex_mem = decode_pipeline(&w).unwrap().ex_mem;

        assert_eq!(ex_mem.funct3, 0b101);
        assert_eq!(ex_mem.rd, 17);
        assert_eq!(
            ex_mem.ctrl,
            ExMemControl {
                valid: false,
                reg_write: true,
                mem_to_reg: false,
                mem_read: false,
                mem_write: true,
                branch_taken: true,
                wb_sel_pc4: false,
            }
        );
    }

    #[test]
    fn memwb_rd_is_masked_to_five_bits() {
        let mut w = [0u32; PIPE_WORDS];
        w[20] = 0xFFFF_FFE3;
        w[21] = 0b1001;
        let mem_wb = decode_pipeline(&w).unwrap().mem_wb;

        assert_eq!(mem_wb.rd, 3);
        assert_eq!(
            mem_wb.ctrl,
            MemWbControl {
                valid: true,
                reg_write: false,
                mem_to_reg: false,
                wb_sel_pc4: true,
            }
        );
    }

    #[test]
    fn ifid_valid_uses_bit_zero_only() {
        let mut w = [0u32; PIPE_WORDS];
        w[3] = 0xFFFF_FFFE;
        assert!(!decode_pipeline(&w).unwrap().if_id.valid);
        w[3] = 1;
        assert!(decode_pipeline(&w).unwrap().if_id.valid);
    }

    #[test]
    fn short_block_reports_actual_length() {
        let w = [0u32; 22];
        let err = decode_pipeline(&w).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                expected: 23,
                actual: 22
            }
        ));
    }

    #[test]
    fn long_block_reports_actual_length() {
        let w = [0u32; 24];
        let err = decode_pipeline(&w).unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthMismatch {
                expected: 23,
                actual: 24
            }
        ));
    }

    #[test]
    fn empty_block_is_rejected() {
        assert!(matches!(
            decode_pipeline(&[]),
            Err(FrameError::LengthMismatch { actual: 0, .. })
        ));
    }

    #[test]
    fn valid_summary_line() {
        let mut w = [0u32; PIPE_WORDS];
        w[3] = 1;
        w[16] = 1;
        let state = decode_pipeline(&w).unwrap();
        assert_eq!(
            state.valid_summary(),
            "IF/ID v=1 | ID/EX v=0 | EX/MEM v=1 | MEM/WB v=0"
        );
    }
}
