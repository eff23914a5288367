//! Inspect a single key line

use std::path::Path;

use colored::Colorize;

use crate::authorized::{LineClassifier, LineGenerator, LineKind, MARKER};
use crate::config::{ServeCommand, Settings};
use crate::error::{KeysError, Result};
use crate::keys::{is_safe_username, parse_pubkey, ParsedKey, PublicKeyRecord};

use super::{load_settings, read_key_line};

pub fn run(
    config: Option<&Path>,
    serve_command: Option<ServeCommand>,
    user: Option<String>,
    line: Option<String>,
) -> Result<()> {
    let serve = load_settings(config)?
        .merge(Settings {
            serve_command,
            ..Settings::default()
        })
        .serve_command
        .unwrap_or_default();

    let line = read_key_line(line)?;
    let classifier = LineClassifier::new(&serve)?;

    let Some((kind, key)) = inspect(&classifier, &line)? else {
        println!("{:<13} {}", "classified:".bold(), "marker".yellow());
        return Ok(());
    };

    let kind = match kind {
        LineKind::Manual => "manual".normal(),
        LineKind::Autogenerated => "autogenerated".yellow(),
    };
    println!("{:<13} {}", "classified:".bold(), kind);
    println!(
        "{:<13} {}",
        "type:".bold(),
        key.key_type.as_deref().unwrap_or("(legacy)")
    );
    if let Some(fingerprint) = key.fingerprint() {
        println!("{:<13} {}", "fingerprint:".bold(), fingerprint);
    }
    for opt in &key.options {
        match &opt.value {
            Some(value) => println!("{:<13} {}=\"{}\"", "option:".bold(), opt.name, value),
            None => println!("{:<13} {}", "option:".bold(), opt.name),
        }
    }
    if !key.comment.is_empty() {
        println!("{:<13} {}", "comment:".bold(), key.comment);
    }

    if let Some(user) = user {
        if !is_safe_username(&user) {
            return Err(KeysError::UnsafeIdentity(user));
        }
        let generated = LineGenerator::new(serve).generate(&PublicKeyRecord { username: user, key })?;
        println!();
        println!("{}", generated);
    }

    Ok(())
}

/// Classify and parse `line`; `None` for the marker comment.
///
/// Parse errors come back before anything is printed.
fn inspect(classifier: &LineClassifier, line: &str) -> Result<Option<(LineKind, ParsedKey)>> {
    if line.trim_end() == MARKER {
        return Ok(None);
    }
    let key = parse_pubkey(line)?;
    Ok(Some((classifier.classify(line), key)))
}
