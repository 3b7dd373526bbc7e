use std::io::{IsTerminal, Write};

use bytes::BytesMut;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rvdebug_frame::{encode_frame, signed32, Frame, PipelineState, REG_COUNT};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// RISC-V integer register ABI names, x0..x31.
pub const ABI_NAMES: [&str; REG_COUNT] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

#[derive(Serialize)]
struct RegisterOutput {
    index: usize,
    name: &'static str,
    value: u32,
    hex: String,
    signed: i32,
}

#[derive(Serialize)]
struct FrameOutput {
    dump_type: String,
    dump_type_code: u8,
    flags: u8,
    halt_seen: bool,
    pipe_empty: bool,
    pad: u8,
    pc: String,
    registers: Vec<RegisterOutput>,
    memory: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline_valid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline: Option<PipelineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline_words: Option<Vec<String>>,
}

impl FrameOutput {
    fn new(frame: &Frame) -> Self {
        let snapshot = frame.snapshot();
        let pipeline = frame.pipeline();
        Self {
            dump_type: snapshot.dump_type.to_string(),
            dump_type_code: snapshot.dump_type.into(),
            flags: snapshot.flags.bits(),
            halt_seen: snapshot.flags.halt_seen(),
            pipe_empty: snapshot.flags.pipe_empty(),
            pad: snapshot.pad,
            pc: hex32(snapshot.pc),
            registers: snapshot
                .registers
                .iter()
                .enumerate()
                .map(|(index, &value)| RegisterOutput {
                    index,
                    name: ABI_NAMES[index],
                    value,
                    hex: hex32(value),
                    signed: signed32(value),
                })
                .collect(),
            memory: hexdump_lines(&snapshot.memory, 0),
            pipeline_valid: pipeline.as_ref().map(PipelineState::valid_summary),
            pipeline,
            pipeline_words: frame
                .pipeline_words()
                .map(|words| words.as_slice().iter().map(|&w| hex32(w)).collect()),
        }
    }
}

/// Render one frame in the selected format.
pub fn print_frame(frame: &Frame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FrameOutput::new(frame)),
        OutputFormat::Table => {
            println!("{}", frame_summary(frame));
            println!("{}", register_table(frame));
            if let Some(state) = frame.pipeline() {
                println!("{}", state.valid_summary());
                println!("{}", pipeline_table(&state));
            }
            print_hexdump(&frame.snapshot().memory);
        }
        OutputFormat::Pretty => {
            println!("{}", frame_summary(frame));
            for line in register_lines(frame) {
                println!("{line}");
            }
            if let Some(state) = frame.pipeline() {
                println!("{}", state.valid_summary());
                for (stage, rows) in pipeline_rows(&state) {
                    let fields = rows
                        .iter()
                        .map(|(key, value)| format!("{key}={value}"))
                        .collect::<Vec<_>>()
                        .join("  ");
                    println!("  {stage:<6} {fields}");
                }
            }
            print_hexdump(&frame.snapshot().memory);
        }
        OutputFormat::Raw => {
            let mut buf = BytesMut::with_capacity(frame.wire_size());
            encode_frame(frame, &mut buf);
            print_raw(&buf);
        }
    }
}

/// One trace step: a compact line per step, or a full record for JSON/raw.
pub fn print_trace_step(step: usize, frame: &Frame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct StepOutput {
                step: usize,
                frame: FrameOutput,
            }
            print_json(&StepOutput {
                step,
                frame: FrameOutput::new(frame),
            });
        }
        OutputFormat::Table | OutputFormat::Pretty => match frame.pipeline() {
            Some(state) => println!(
                "[{step:>4}] {}  {}",
                frame_summary(frame),
                state.valid_summary()
            ),
            None => println!("[{step:>4}] {}", frame_summary(frame)),
        },
        OutputFormat::Raw => print_frame(frame, format),
    }
}

/// Print a status record for commands that produce no frame.
pub fn print_status(command: &str, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let mut out = Map::new();
            out.insert("command".into(), Value::from(command));
            out.insert("ok".into(), Value::from(true));
            for (key, value) in fields {
                out.insert((*key).to_string(), Value::from(value.as_str()));
            }
            print_json(&out);
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let details = fields
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            if details.is_empty() {
                println!("[OK] {command}");
            } else {
                println!("[OK] {command} {details}");
            }
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_hexdump(memory: &[u8]) {
    for line in hexdump_lines(memory, 0) {
        println!("{line}");
    }
}

pub fn hex32(value: u32) -> String {
    format!("0x{value:08x}")
}

/// Header line, e.g. `type=STEP  flags=0x03  pc=0x00000040  pad=0x00  ...`.
pub fn frame_summary(frame: &Frame) -> String {
    let snapshot = frame.snapshot();
    format!(
        "type={}  flags=0x{:02x}  pc=0x{:08x}  pad=0x{:02x}  halt_seen={}  pipe_empty={}",
        snapshot.dump_type,
        snapshot.flags.bits(),
        snapshot.pc,
        snapshot.pad,
        u8::from(snapshot.flags.halt_seen()),
        u8::from(snapshot.flags.pipe_empty()),
    )
}

/// Memory rendered 16 bytes per line: `0010: 00 01 02 ...`.
pub fn hexdump_lines(bytes: &[u8], base: usize) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(index, chunk)| {
            let hex = chunk
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{:04x}: {hex}", base + index * 16)
        })
        .collect()
}

fn register_table(frame: &Frame) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["REG", "ABI", "HEX", "DEC"]);
    for (index, &value) in frame.snapshot().registers.iter().enumerate() {
        table.add_row(vec![
            format!("x{index}"),
            ABI_NAMES[index].to_string(),
            hex32(value),
            signed32(value).to_string(),
        ]);
    }
    table
}

fn register_lines(frame: &Frame) -> Vec<String> {
    let cells: Vec<String> = frame
        .snapshot()
        .registers
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            format!(
                "{:<8} 0x{value:08x} {:>11}",
                format!("x{index}/{}", ABI_NAMES[index]),
                signed32(value)
            )
        })
        .collect();
    cells.chunks(4).map(|row| row.join("   ")).collect()
}

fn pipeline_table(state: &PipelineState) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["STAGE", "FIELD", "VALUE"]);
    for (stage, rows) in pipeline_rows(state) {
        for (key, value) in rows {
            table.add_row(vec![stage.to_string(), key.to_string(), value]);
        }
    }
    table
}

fn with_signed(value: u32) -> String {
    format!("0x{value:08x} ({})", signed32(value))
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Key/value rows for each latch, in pipeline order.
pub fn pipeline_rows(state: &PipelineState) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
    let if_id = &state.if_id;
    let id_ex = &state.id_ex;
    let ex_mem = &state.ex_mem;
    let mem_wb = &state.mem_wb;

    vec![
        (
            "IF/ID",
            vec![
                ("valid", flag(if_id.valid).to_string()),
                ("pc", hex32(if_id.pc)),
                ("pc+4", hex32(if_id.pc_plus4)),
                ("instr", hex32(if_id.instr)),
            ],
        ),
        (
            "ID/EX",
            vec![
                ("valid", flag(id_ex.ctrl.valid).to_string()),
                ("pc", hex32(id_ex.pc)),
                ("pc+4", hex32(id_ex.pc_plus4)),
                ("rs1_data", with_signed(id_ex.rs1_data)),
                ("rs2_data", with_signed(id_ex.rs2_data)),
                ("imm", with_signed(id_ex.imm)),
                ("rs1/rs2/rd", format!("{}/{}/{}", id_ex.rs1, id_ex.rs2, id_ex.rd)),
                ("f3/f7", format!("{}/{}", id_ex.funct3, id_ex.funct7)),
                (
                    "ctrl",
                    format!(
                        "RW={} MR={} MW={} M2R={} AS={} ALUop={} BR={} J={} JALR={} PC4={}",
                        flag(id_ex.ctrl.reg_write),
                        flag(id_ex.ctrl.mem_read),
                        flag(id_ex.ctrl.mem_write),
                        flag(id_ex.ctrl.mem_to_reg),
                        flag(id_ex.ctrl.alu_src),
                        id_ex.ctrl.alu_op,
                        flag(id_ex.ctrl.branch),
                        flag(id_ex.ctrl.jump),
                        flag(id_ex.ctrl.jalr),
                        flag(id_ex.ctrl.wb_sel_pc4),
                    ),
                ),
            ],
        ),
        (
            "EX/MEM",
            vec![
                ("valid", flag(ex_mem.ctrl.valid).to_string()),
                ("alu_result", with_signed(ex_mem.alu_result)),
                ("rs2_pass", with_signed(ex_mem.rs2_pass)),
                ("br_target", hex32(ex_mem.branch_target)),
                ("pc+4", hex32(ex_mem.pc_plus4)),
                ("rd/f3", format!("{}/{}", ex_mem.rd, ex_mem.funct3)),
                (
                    "ctrl",
                    format!(
                        "RW={} MR={} MW={} M2R={} BT={} PC4={}",
                        flag(ex_mem.ctrl.reg_write),
                        flag(ex_mem.ctrl.mem_read),
                        flag(ex_mem.ctrl.mem_write),
                        flag(ex_mem.ctrl.mem_to_reg),
                        flag(ex_mem.ctrl.branch_taken),
                        flag(ex_mem.ctrl.wb_sel_pc4),
                    ),
                ),
            ],
        ),
        (
            "MEM/WB",
            vec![
                ("valid", flag(mem_wb.ctrl.valid).to_string()),
                ("mem_data", with_signed(mem_wb.mem_read_data)),
                ("alu_result", with_signed(mem_wb.alu_result)),
                ("pc+4", hex32(mem_wb.pc_plus4)),
                ("rd", mem_wb.rd.to_string()),
                (
                    "ctrl",
                    format!(
                        "RW={} M2R={} PC4={}",
                        flag(mem_wb.ctrl.reg_write),
                        flag(mem_wb.ctrl.mem_to_reg),
                        flag(mem_wb.ctrl.wb_sel_pc4),
                    ),
                ),
            ],
        ),
    ]
}
