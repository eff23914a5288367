//! Regenerating an `authorized_keys` file
//!
//! The new document is
//!
//! ```text
//! <manual lines from the existing file, in their original order>
//! ### autogenerated by gitosis, DO NOT EDIT
//! <one restricted line per key found in the key directory>
//! ```
//!
//! and replaces the old file through a temporary file in the same
//! directory, so readers see either the old or the new file in full.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{LineClassifier, LineGenerator, LineKind, MARKER};
use crate::config::ServeCommand;
use crate::error::{io_at, KeysError, Result};
use crate::keys::{scan_keydir, PublicKeyRecord};

/// An input line or file left out of the generated block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub path: PathBuf,
    /// `None` when the whole file was skipped.
    pub line_no: Option<usize>,
    pub reason: String,
}

/// What a synthesis run kept, produced and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub manual_lines: usize,
    pub generated_lines: usize,
    pub skipped: Vec<Skipped>,
}

/// Classifier and generator for one serving program.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    classifier: LineClassifier,
    generator: LineGenerator,
}

impl Synthesizer {
    pub fn new(serve: ServeCommand) -> Result<Self> {
        Ok(Self {
            classifier: LineClassifier::new(&serve)?,
            generator: LineGenerator::new(serve),
        })
    }

    /// Build the new document without touching the target.
    ///
    /// Manual lines are copied byte for byte, whatever their encoding.
    pub fn render(&self, existing: &Path, keydir: &Path) -> Result<(Vec<u8>, SynthesisReport)> {
        let mut report = SynthesisReport::default();
        let mut out = Vec::new();

        for line in read_lines_or_empty(existing)? {
            let kind = match std::str::from_utf8(&line) {
                Ok(text) => self.classifier.classify(text),
                Err(_) => LineKind::Manual,
            };
            if kind == LineKind::Manual {
                out.extend_from_slice(&line);
                out.push(b'\n');
                report.manual_lines += 1;
            }
        }

        out.extend_from_slice(MARKER.as_bytes());
        out.push(b'\n');

        for item in scan_keydir(keydir)? {
            let key_line = match item {
                Ok(key_line) => key_line,
                Err(KeysError::UnsafeIdentity(filename)) => {
                    tracing::warn!(file = %filename, "unsafe SSH username in key file, skipping");
                    report.skipped.push(Skipped {
                        path: keydir.join(&filename),
                        line_no: None,
                        reason: format!("unsafe username in file name {filename:?}"),
                    });
                    continue;
                }
                Err(KeysError::UndecodableLine { path, line_no }) => {
                    tracing::warn!(file = %path.display(), line = line_no, "key line is not UTF-8, skipping");
                    report.skipped.push(Skipped {
                        path,
                        line_no: Some(line_no),
                        reason: "key line is not valid UTF-8".to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let generated = PublicKeyRecord::parse(&key_line.username, &key_line.line)
                .and_then(|record| {
                    let line = self.generator.generate(&record)?;
                    Ok((record, line))
                });

            match generated {
                Ok((record, line)) => {
                    let fingerprint = record.key.fingerprint();
                    tracing::debug!(
                        user = %record.username,
                        fingerprint = fingerprint.as_deref().unwrap_or("-"),
                        "authorized key"
                    );
                    out.extend_from_slice(line.as_bytes());
                    out.push(b'\n');
                    report.generated_lines += 1;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(
                        file = %key_line.path.display(),
                        line = key_line.line_no,
                        error = %e,
                        "skipping key"
                    );
                    report.skipped.push(Skipped {
                        path: key_line.path,
                        line_no: Some(key_line.line_no),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok((out, report))
    }

    /// Regenerate `existing` from the keys in `keydir`.
    pub fn synthesize(&self, existing: &Path, keydir: &Path) -> Result<SynthesisReport> {
        let (document, report) = self.render(existing, keydir)?;
        write_atomically(existing, &document)?;

        tracing::info!(
            path = %existing.display(),
            manual = report.manual_lines,
            generated = report.generated_lines,
            skipped = report.skipped.len(),
            "authorized_keys updated"
        );
        Ok(report)
    }
}

/// Regenerate `existing` with the default serving program.
pub fn synthesize(existing: &Path, keydir: &Path) -> Result<SynthesisReport> {
    Synthesizer::new(ServeCommand::default())?.synthesize(existing, keydir)
}

/// Raw lines of `path` without their newline; a missing file has none.
fn read_lines_or_empty(path: &Path) -> Result<Vec<Vec<u8>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_at(path)(e)),
    };

    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).map_err(io_at(path))? == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        lines.push(line);
    }
    Ok(lines)
}

/// Replace `path` with `contents` via write, sync and rename.
///
/// On failure the temporary file is removed and `path` is left as it was.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    ensure_dir(dir)?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| KeysError::InvalidConfig(format!("{} is not a file path", path.display())))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_at(dir))?;

    tmp.write_all(contents).map_err(io_at(tmp.path()))?;
    tmp.flush().map_err(io_at(tmp.path()))?;
    tmp.as_file().sync_all().map_err(io_at(tmp.path()))?;

    // sshd refuses group or world writable key files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
            .map_err(io_at(tmp.path()))?;
    }

    tmp.persist(path).map_err(|e| io_at(path)(e.error))?;

    #[cfg(unix)]
    {
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            tracing::warn!(dir = %dir.display(), error = %e, "could not sync directory after rename");
        }
    }

    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(io_at(dir))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(io_at(dir))?;
    }

    Ok(())
}
