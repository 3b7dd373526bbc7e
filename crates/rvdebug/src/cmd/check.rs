use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rvdebug_image::{parse_file, ProgramImage};
use serde::Serialize;

use crate::cmd::CheckArgs;
use crate::exit::{image_error, CliResult, SUCCESS};
use crate::output::{hex32, print_json, OutputFormat};

#[derive(Serialize)]
struct WordOutput {
    addr: String,
    data: String,
}

#[derive(Serialize)]
struct CheckOutput {
    path: String,
    words: usize,
    lowest: String,
    highest: String,
    image: Vec<WordOutput>,
}

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let image = parse_file(&args.file)
        .and_then(ProgramImage::non_empty)
        .map_err(|err| image_error(&format!("invalid program {}", args.file.display()), err))?;
    let (lowest, highest) = image.address_span().unwrap_or_default();

    match format {
        OutputFormat::Json => print_json(&CheckOutput {
            path: args.file.display().to_string(),
            words: image.len(),
            lowest: hex32(lowest),
            highest: hex32(highest),
            image: image
                .iter()
                .map(|&(addr, data)| WordOutput {
                    addr: hex32(addr),
                    data: hex32(data),
                })
                .collect(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDR", "DATA"]);
            for &(addr, data) in &image {
                table.add_row(vec![hex32(addr), hex32(data)]);
            }
            println!("{table}");
            println!(
                "{} words, 0x{lowest:08x}..=0x{highest:08x}",
                image.len()
            );
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for &(addr, data) in &image {
                println!("{addr:08x}:{data:08x}");
            }
        }
    }
    Ok(SUCCESS)
}
