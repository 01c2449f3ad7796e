//! Gid command implementation

use std::process::ExitCode;

use crate::gid::Gid;

use super::{EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Parse a packed GID written in decimal or `0x` hexadecimal.
pub fn parse_gid(value: &str) -> Result<Gid, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse::<u32>(),
    };
    parsed.map(Gid::from_raw).map_err(|e| format!("Invalid GID '{}': {}", value, e))
}

/// Execute the gid command
pub fn run_gid(value: &str) -> ExitCode {
    let gid = match parse_gid(value) {
        Ok(gid) => gid,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let flip = gid.flip();
    println!("raw:    {:#010x} ({})", gid.raw(), gid.raw());
    match gid.local_id() {
        Some(id) => println!("tile:   {} (gid {})", id, gid.bare()),
        None => println!("tile:   empty"),
    }
    println!("flip_h: {}", flip.h);
    println!("flip_v: {}", flip.v);
    ExitCode::from(EXIT_SUCCESS)
}
