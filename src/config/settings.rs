//! Settings file and path resolution
//!
//! Settings come from three places, highest priority first: command line
//! flags, a JSON settings file, built-in defaults.
//!
//! ```json
//! {
//!   "keydir": "/srv/gitosis/repositories/gitosis-admin.git/keydir",
//!   "authorized_keys": "/srv/gitosis/.ssh/authorized_keys",
//!   "serve_command": "gitosis-serve"
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ServeCommand;
use crate::error::{io_at, KeysError, Result};

const SETTINGS_DIR: &str = "gitosis-keys";
const SETTINGS_FILE: &str = "config.json";

/// Partially specified settings; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keydir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_keys: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve_command: Option<ServeCommand>,
}

/// Fully resolved settings for one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub keydir: PathBuf,
    pub authorized_keys: PathBuf,
    pub serve_command: ServeCommand,
}

impl Settings {
    /// Read a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(io_at(path))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Read the default settings file, if there is one.
    pub fn load_default() -> Result<Self> {
        let Some(path) = default_settings_path() else {
            return Ok(Self::default());
        };
        match fs::read(&path) {
            Ok(raw) => {
                tracing::debug!(path = %path.display(), "loaded settings");
                Ok(serde_json::from_slice(&raw)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(io_at(path)(e)),
        }
    }

    /// Fields set in `overrides` win over fields set in `self`.
    pub fn merge(self, overrides: Settings) -> Settings {
        Settings {
            keydir: overrides.keydir.or(self.keydir),
            authorized_keys: overrides.authorized_keys.or(self.authorized_keys),
            serve_command: overrides.serve_command.or(self.serve_command),
        }
    }

    /// Fill in defaults; the key directory has none and must be given.
    pub fn resolve(self) -> Result<SyncSettings> {
        let keydir = self
            .keydir
            .ok_or_else(|| KeysError::InvalidConfig("no key directory given".into()))?;

        let authorized_keys = match self.authorized_keys {
            Some(path) => path,
            None => default_authorized_keys()?,
        };

        Ok(SyncSettings {
            keydir,
            authorized_keys,
            serve_command: self.serve_command.unwrap_or_default(),
        })
    }
}

/// `$XDG_CONFIG_HOME/gitosis-keys/config.json` or the platform equivalent.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// `~/.ssh/authorized_keys` of the current user.
pub fn default_authorized_keys() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".ssh").join("authorized_keys"))
        .ok_or_else(|| KeysError::InvalidConfig("cannot determine home directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"keydir": "/srv/keydir", "serve_command": "/opt/bin/gitosis-serve"}"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.keydir, Some(PathBuf::from("/srv/keydir")));
        assert_eq!(settings.authorized_keys, None);
        assert_eq!(
            settings.serve_command.unwrap().program(),
            "/opt/bin/gitosis-serve"
        );
    }

    #[test]
    fn test_load_rejects_unknown_and_invalid_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{"keydirs": "/srv/keydir"}"#).unwrap();
        assert!(matches!(Settings::load(&path), Err(KeysError::Json(_))));

        fs::write(&path, r#"{"serve_command": "rm -rf /"}"#).unwrap();
        assert!(matches!(Settings::load(&path), Err(KeysError::Json(_))));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, KeysError::FileIo { .. }));
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = Settings {
            keydir: Some("/from/file".into()),
            authorized_keys: Some("/file/authorized_keys".into()),
            serve_command: None,
        };
        let flags = Settings {
            keydir: Some("/from/flag".into()),
            ..Settings::default()
        };

        let merged = file.merge(flags);
        assert_eq!(merged.keydir, Some(PathBuf::from("/from/flag")));
        assert_eq!(merged.authorized_keys, Some(PathBuf::from("/file/authorized_keys")));
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = Settings {
            keydir: Some("/srv/keydir".into()),
            authorized_keys: Some("/tmp/ak".into()),
            serve_command: None,
        }
        .resolve()
        .unwrap();
        assert_eq!(resolved.serve_command, ServeCommand::default());
        assert_eq!(resolved.authorized_keys, PathBuf::from("/tmp/ak"));

        assert!(matches!(
            Settings::default().resolve(),
            Err(KeysError::InvalidConfig(_))
        ));
    }
}
