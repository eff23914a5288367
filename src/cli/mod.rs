//! CLI command implementations

pub mod check;
pub mod sync;
pub mod whois;

use std::io::{self, BufRead};
use std::path::Path;

use crate::config::Settings;
use crate::error::{KeysError, Result};

/// Settings from `--config`, or from the default location when present.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => Settings::load(path),
        None => Settings::load_default(),
    }
}

/// A key line from the command line, or the first line of stdin.
pub fn read_key_line(arg: Option<String>) -> Result<String> {
    if let Some(line) = arg {
        return Ok(line);
    }

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    if line.trim().is_empty() {
        return Err(KeysError::malformed("no public key given on stdin"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
