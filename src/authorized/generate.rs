//! Restricted `authorized_keys` line generation
//!
//! Every key is wrapped as
//!
//! ```text
//! command="<serve> <user>",no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty[,from="<hosts>"] <type> <key> <comment>
//! ```
//!
//! Only options listed in [`CARRY_THROUGH_OPTIONS`] are copied from the
//! input key. Everything else the key file asked for is dropped.

use crate::config::ServeCommand;
use crate::error::{KeysError, Result};
use crate::keys::{is_safe_username, PublicKeyRecord};

/// Flags appended to every forced command.
pub const SAFETY_OPTIONS: [&str; 4] = [
    "no-port-forwarding",
    "no-X11-forwarding",
    "no-agent-forwarding",
    "no-pty",
];

/// Input options copied into the generated line.
pub const CARRY_THROUGH_OPTIONS: &[&str] = &["from"];

// Must never appear in output, whatever the input contained.
const FORBIDDEN_TOKENS: &[&str] = &[
    "environment=",
    "permitopen=",
    "permitlisten=",
    "tunnel=",
    "principals=",
];

/// Builds forced-command lines for one serving program.
#[derive(Debug, Clone)]
pub struct LineGenerator {
    serve: ServeCommand,
}

impl LineGenerator {
    pub fn new(serve: ServeCommand) -> Self {
        Self { serve }
    }

    pub fn serve_command(&self) -> &ServeCommand {
        &self.serve
    }

    /// Render the restricted line for `record`.
    ///
    /// Fails with `MalformedKey` when a carried option or the key material
    /// cannot be written back safely; the caller skips such keys rather
    /// than emitting them with fewer restrictions.
    pub fn generate(&self, record: &PublicKeyRecord) -> Result<String> {
        if !is_safe_username(&record.username) {
            return Err(KeysError::UnsafeIdentity(record.username.clone()));
        }
        let key = &record.key;

        let mut line = format!("command=\"{}\"", self.serve.for_user(&record.username));
        for flag in SAFETY_OPTIONS {
            line.push(',');
            line.push_str(flag);
        }

        for &name in CARRY_THROUGH_OPTIONS {
            let Some(opt) = key.option(name) else {
                continue;
            };
            match opt.value.as_deref() {
                Some(value) if is_host_pattern_list(value) => {
                    line.push_str(&format!(",{name}=\"{value}\""));
                }
                _ => {
                    return Err(KeysError::malformed(format!(
                        "unsupported value for option {name}"
                    )))
                }
            }
        }

        line.push(' ');
        if let Some(key_type) = key.key_type.as_deref() {
            if !key_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '@' | '.' | '_'))
            {
                return Err(KeysError::malformed("bad characters in key type"));
            }
            line.push_str(key_type);
            line.push(' ');
        }

        if key.key_data.is_empty()
            || !key
                .key_data
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '.'))
        {
            return Err(KeysError::malformed("bad characters in key material"));
        }
        line.push_str(&key.key_data);

        let comment = display_comment(&key.comment);
        if !comment.is_empty() {
            line.push(' ');
            line.push_str(&comment);
        }

        let lower = line.to_ascii_lowercase();
        if lower.matches("command=").count() != 1
            || FORBIDDEN_TOKENS.iter().any(|token| lower.contains(token))
        {
            return Err(KeysError::malformed("key contains option syntax"));
        }

        Ok(line)
    }
}

// Host and address patterns as accepted by `from=`.
fn is_host_pattern_list(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '*' | '?' | '!' | ':' | '/' | ',' | '_' | '%')
        })
}

/// Comment text safe to echo after the key.
pub fn display_comment(comment: &str) -> String {
    comment
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '@' | '.' | '_' | '+' | '-' | ':' | '/' | '(' | ')' | '<' | '>') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
