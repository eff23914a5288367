//! The program a generated key is forced to run

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{KeysError, Result};

/// Default serving program.
pub const DEFAULT_SERVE_PROGRAM: &str = "gitosis-serve";

// Optional absolute directory, then a plain program name.
static VALID_PROGRAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:/[^\s"\\\p{Cc}]+/)?[A-Za-z0-9._-]+$"#).expect("serve command pattern compiles")
});

/// Serving program named in every forced command
///
/// Either a bare program name (`gitosis-serve`) or an absolute path
/// (`/usr/local/bin/gitosis-serve`). It is written inside a double-quoted
/// `command="..."` option, so quotes, backslashes and blanks are refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServeCommand {
    program: String,
}

impl ServeCommand {
    pub fn new(program: impl Into<String>) -> Result<Self> {
        let program = program.into();
        if !VALID_PROGRAM.is_match(&program) {
            return Err(KeysError::InvalidConfig(format!(
                "serve command {program:?} must be a program name or an absolute path"
            )));
        }
        Ok(Self { program })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Program name without its directory.
    pub fn basename(&self) -> &str {
        match self.program.rfind('/') {
            Some(slash) => &self.program[slash + 1..],
            None => &self.program,
        }
    }

    /// Command line run for `username`, e.g. `gitosis-serve alice`.
    pub fn for_user(&self, username: &str) -> String {
        format!("{} {}", self.program, username)
    }
}

impl Default for ServeCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_SERVE_PROGRAM.to_string(),
        }
    }
}

impl fmt::Display for ServeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)
    }
}

impl TryFrom<String> for ServeCommand {
    type Error = KeysError;

    fn try_from(program: String) -> Result<Self> {
        Self::new(program)
    }
}

impl From<ServeCommand> for String {
    fn from(command: ServeCommand) -> Self {
        command.program
    }
}
