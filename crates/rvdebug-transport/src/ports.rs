use std::path::{Path, PathBuf};

use crate::error::Result;

/// Device-node prefixes that usually belong to USB-UART bridges and
/// on-board UARTs a debug target can sit behind. `cu.` matches every macOS
/// call-out device.
const PORT_PREFIXES: &[&str] = &["ttyUSB", "ttyACM", "ttyAMA", "rfcomm", "cu."];

/// List candidate serial ports under `/dev`, sorted by path.
pub fn list_ports() -> Result<Vec<PathBuf>> {
    list_ports_in(Path::new("/dev"))
}

/// List candidate serial ports in `dir`, sorted by path.
pub fn list_ports_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut ports = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if PORT_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
            ports.push(entry.path());
        }
    }
    ports.sort();
    Ok(ports)
}
