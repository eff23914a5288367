//! Regenerate authorized_keys from the key directory

use std::io::{self, Write};
use std::path::Path;

use colored::Colorize;

use crate::authorized::{SynthesisReport, Synthesizer};
use crate::config::Settings;
use crate::error::Result;

use super::load_settings;

pub fn run(config: Option<&Path>, overrides: Settings, dry_run: bool) -> Result<()> {
    let settings = load_settings(config)?.merge(overrides).resolve()?;
    tracing::debug!(?settings, "resolved settings");

    let synthesizer = Synthesizer::new(settings.serve_command)?;

    if dry_run {
        let (document, report) =
            synthesizer.render(&settings.authorized_keys, &settings.keydir)?;
        io::stdout().write_all(&document)?;
        print_skipped(&report);
        return Ok(());
    }

    let report = synthesizer.synthesize(&settings.authorized_keys, &settings.keydir)?;

    eprintln!(
        "{} {}: {} manual, {} generated",
        "Updated".green().bold(),
        settings.authorized_keys.display().to_string().cyan(),
        report.manual_lines,
        report.generated_lines,
    );
    print_skipped(&report);

    Ok(())
}

fn print_skipped(report: &SynthesisReport) {
    if report.skipped.is_empty() {
        return;
    }

    eprintln!("{} {} skipped:", "Warning:".yellow().bold(), report.skipped.len());
    for skipped in &report.skipped {
        match skipped.line_no {
            Some(line) => eprintln!("  {}:{}: {}", skipped.path.display(), line, skipped.reason),
            None => eprintln!("  {}: {}", skipped.path.display(), skipped.reason),
        }
    }
}
