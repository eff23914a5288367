//! Key directory scanning
//!
//! A key directory holds one `<username>.pub` file per user, each with one
//! or more public key lines. Files are visited in sorted name order and
//! read one at a time.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::is_safe_username;
use crate::error::{io_at, KeysError, Result};

const KEY_EXTENSION: &str = "pub";

/// A `*.pub` file whose stem passed username validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFileEntry {
    pub filename: String,
    pub username: String,
}

impl KeyFileEntry {
    /// Classify a directory entry name.
    ///
    /// Returns `None` for names that are not key files at all (dotfiles,
    /// other extensions) and `UnsafeIdentity` for key files whose stem is
    /// not a safe username.
    pub fn from_filename(filename: &str) -> Option<Result<Self>> {
        if filename.starts_with('.') {
            return None;
        }
        let stem = filename.strip_suffix(KEY_EXTENSION)?.strip_suffix('.')?;

        if !is_safe_username(stem) {
            return Some(Err(KeysError::UnsafeIdentity(filename.to_string())));
        }
        Some(Ok(Self {
            filename: filename.to_string(),
            username: stem.to_string(),
        }))
    }
}

/// One key line found in a key file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLine {
    pub username: String,
    pub line: String,
    pub path: PathBuf,
    /// 1-based line number within `path`.
    pub line_no: usize,
}

struct OpenKeyFile {
    username: String,
    path: PathBuf,
    reader: BufReader<File>,
    line_no: usize,
}

impl OpenKeyFile {
    /// Read the next raw line without its terminator, or `None` at EOF.
    fn read_raw(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(Some(buf))
    }
}

/// Blank lines and `#` comments, judged on the raw bytes.
fn is_ignorable(raw: &[u8]) -> bool {
    match raw.iter().find(|b| !b.is_ascii_whitespace()) {
        None => true,
        Some(&b) => b == b'#',
    }
}

/// Lazy, single-pass iterator over the key lines of a directory
///
/// Rejected file names come out as recoverable `UnsafeIdentity` items and
/// lines that are not UTF-8 as recoverable `UndecodableLine` items; the
/// scan continues past both. I/O failures on a key file are fatal.
pub struct KeyScanner {
    dir: PathBuf,
    names: std::vec::IntoIter<OsString>,
    current: Option<OpenKeyFile>,
}

/// List `dir` and return an iterator over its key lines.
///
/// Fails only when the directory itself cannot be listed.
pub fn scan_keydir(dir: &Path) -> Result<KeyScanner> {
    let mut names = fs::read_dir(dir)
        .map_err(io_at(dir))?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(io_at(dir))?;
    names.sort();

    Ok(KeyScanner {
        dir: dir.to_path_buf(),
        names: names.into_iter(),
        current: None,
    })
}

impl KeyScanner {
    /// Open the next key file, or report why a key file was rejected.
    fn open_next(&mut self) -> Option<Result<OpenKeyFile>> {
        for name in self.names.by_ref() {
            let filename = match name.to_str() {
                Some(filename) => filename,
                None => {
                    let lossy = name.to_string_lossy();
                    if lossy.starts_with('.') || !lossy.ends_with(".pub") {
                        continue;
                    }
                    return Some(Err(KeysError::UnsafeIdentity(lossy.into_owned())));
                }
            };

            let entry = match KeyFileEntry::from_filename(filename) {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => return Some(Err(e)),
                None => continue,
            };

            let path = self.dir.join(&entry.filename);
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "skipping non-file key entry");
                continue;
            }

            return Some(
                File::open(&path)
                    .map_err(io_at(&path))
                    .map(|file| OpenKeyFile {
                        username: entry.username,
                        reader: BufReader::new(file),
                        path,
                        line_no: 0,
                    }),
            );
        }
        None
    }
}

impl Iterator for KeyScanner {
    type Item = Result<KeyLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.read_raw() {
                    Ok(Some(raw)) => {
                        if is_ignorable(&raw) {
                            continue;
                        }
                        let line = match std::str::from_utf8(&raw) {
                            Ok(text) => text.trim(),
                            Err(_) => {
                                return Some(Err(KeysError::UndecodableLine {
                                    path: current.path.clone(),
                                    line_no: current.line_no,
                                }))
                            }
                        };
                        return Some(Ok(KeyLine {
                            username: current.username.clone(),
                            line: line.to_string(),
                            path: current.path.clone(),
                            line_no: current.line_no,
                        }));
                    }
                    Err(e) => {
                        let path = current.path.clone();
                        self.current = None;
                        return Some(Err(io_at(path)(e)));
                    }
                    // Dropping the reader closes the file before the next one opens.
                    Ok(None) => self.current = None,
                }
            }

            match self.open_next()? {
                Ok(file) => self.current = Some(file),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
