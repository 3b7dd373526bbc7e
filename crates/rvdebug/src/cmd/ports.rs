use rvdebug_transport::list_ports;
use serde::Serialize;

use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct PortsOutput {
    ports: Vec<String>,
}

pub fn run(format: OutputFormat) -> CliResult<i32> {
    let ports: Vec<String> = list_ports()
        .map_err(|err| transport_error("port scan failed", err))?
        .into_iter()
        .map(|path| path.display().to_string())
        .collect();

    match format {
        OutputFormat::Json => print_json(&PortsOutput { ports }),
        OutputFormat::Table | OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("no serial ports found");
            }
            for port in &ports {
                println!("{port}");
            }
        }
        OutputFormat::Raw => {
            for port in &ports {
                println!("{port}");
            }
        }
    }
    Ok(SUCCESS)
}
