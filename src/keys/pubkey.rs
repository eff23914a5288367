//! OpenSSH public key line parser
//!
//! Understands the commonly used subset of the `authorized_keys` grammar:
//!
//! ```text
//! [options] [keytype] key-material [comment...]
//! ```
//!
//! `options` is a comma separated list of `name` or `name=value` items where
//! a value is either a bare word or a double quoted string. Quoted values
//! may contain spaces and commas but never a double quote, so every quote
//! must be closed before the next option starts.

use ssh_key::{Algorithm, HashAlg};

use crate::error::{KeysError, Result};

/// One `name` or `name=value` item of an options clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOption {
    pub name: String,
    /// Value with surrounding quotes removed; `None` for flag options.
    pub value: Option<String>,
}

impl KeyOption {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A parsed public key line, not yet tied to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub options: Vec<KeyOption>,
    /// `None` for legacy keys that start directly with key material.
    pub key_type: Option<String>,
    pub key_data: String,
    /// Free text after the key. Display only, never trusted.
    pub comment: String,
}

impl ParsedKey {
    /// First option called `name` (option names are case insensitive).
    pub fn option(&self, name: &str) -> Option<&KeyOption> {
        self.options.iter().find(|opt| opt.is(name))
    }

    /// SHA256 fingerprint, if the key material decodes as an OpenSSH key.
    pub fn fingerprint(&self) -> Option<String> {
        let key_type = self.key_type.as_deref()?;
        let key = ssh_key::PublicKey::from_openssh(&format!("{} {}", key_type, self.key_data)).ok()?;
        Some(key.fingerprint(HashAlg::Sha256).to_string())
    }
}

/// A key that belongs to a validated username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    pub username: String,
    pub key: ParsedKey,
}

impl PublicKeyRecord {
    /// Parse `line` on behalf of `username`.
    ///
    /// The username must already have passed [`is_safe_username`]; it is
    /// taken from the key file name, never from the key line.
    ///
    /// [`is_safe_username`]: super::is_safe_username
    pub fn parse(username: &str, line: &str) -> Result<Self> {
        Ok(Self {
            username: username.to_string(),
            key: parse_pubkey(line)?,
        })
    }
}

/// Parse a single public key line.
pub fn parse_pubkey(line: &str) -> Result<ParsedKey> {
    let line = line.trim();
    let first = line
        .split_whitespace()
        .next()
        .ok_or_else(|| KeysError::malformed("empty line"))?;

    let (options, rest) = if is_key_type(first) || is_legacy_bits(first) {
        (Vec::new(), line)
    } else {
        let (clause, rest) = split_options_clause(line)?;
        (parse_options(clause)?, rest)
    };

    let mut tokens = rest.split_whitespace();
    let first = tokens
        .next()
        .ok_or_else(|| KeysError::malformed("missing key material"))?;

    let (key_type, key_data) = if is_key_type(first) {
        let data = tokens
            .next()
            .ok_or_else(|| KeysError::malformed(format!("missing key material after {first}")))?;
        (Some(first.to_string()), data)
    } else {
        (None, first)
    };

    let comment = tokens.collect::<Vec<_>>().join(" ");

    Ok(ParsedKey {
        options,
        key_type,
        key_data: key_data.to_string(),
        comment,
    })
}

/// Recognize a key type token such as `ssh-ed25519` or a certificate type.
pub fn is_key_type(token: &str) -> bool {
    if token.starts_with("ssh-")
        || token.starts_with("sk-")
        || token.starts_with("ecdsa-sha2-")
        || token.ends_with("-cert-v01@openssh.com")
    {
        return true;
    }
    matches!(Algorithm::new(token), Ok(alg) if !matches!(alg, Algorithm::Other(_)))
}

// SSH1 RSA keys start with the modulus size.
fn is_legacy_bits(token: &str) -> bool {
    token.bytes().all(|b| b.is_ascii_digit())
}

/// Split off the options clause: everything up to the first unquoted blank.
fn split_options_clause(line: &str) -> Result<(&str, &str)> {
    let mut in_quote = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            c if c.is_whitespace() && !in_quote => return Ok((&line[..i], &line[i..])),
            _ => {}
        }
    }
    if in_quote {
        Err(KeysError::malformed("unterminated quote in options"))
    } else {
        Ok((line, ""))
    }
}

fn parse_options(clause: &str) -> Result<Vec<KeyOption>> {
    let mut options = Vec::new();
    let mut in_quote = false;
    let mut start = 0;

    for (i, c) in clause.char_indices() {
        match c {
            '"' => in_quote = !in_quote,
            ',' if !in_quote => {
                options.push(parse_option(&clause[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quote {
        return Err(KeysError::malformed("unterminated quote in options"));
    }
    options.push(parse_option(&clause[start..])?);

    Ok(options)
}

fn parse_option(item: &str) -> Result<KeyOption> {
    let (name, value) = match item.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (item, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(KeysError::malformed(format!("bad option name {name:?}")));
    }

    let value = match value {
        None => None,
        Some(raw) => Some(unquote(raw).ok_or_else(|| {
            KeysError::malformed(format!("bad quoting in value of option {name:?}"))
        })?),
    };

    Ok(KeyOption {
        name: name.to_string(),
        value,
    })
}

// A value is either fully quoted or contains no quote at all.
fn unquote(raw: &str) -> Option<String> {
    match raw.strip_prefix('"') {
        Some(inner) => {
            let inner = inner.strip_suffix('"')?;
            (!inner.contains('"')).then(|| inner.to_string())
        }
        None => (!raw.contains('"')).then(|| raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

    #[test]
    fn test_plain_key() {
        let key = parse_pubkey("ssh-rsa AAAAB3NzaC1yc2E alice@laptop").unwrap();
        assert!(key.options.is_empty());
        assert_eq!(key.key_type.as_deref(), Some("ssh-rsa"));
        assert_eq!(key.key_data, "AAAAB3NzaC1yc2E");
        assert_eq!(key.comment, "alice@laptop");
    }

    #[test]
    fn test_comment_is_optional_and_joined() {
        let key = parse_pubkey("ssh-ed25519 AAAA").unwrap();
        assert_eq!(key.comment, "");

        let key = parse_pubkey("  ssh-ed25519   AAAA  work   laptop  ").unwrap();
        assert_eq!(key.comment, "work laptop");
    }

    #[test]
    fn test_options_clause() {
        let key = parse_pubkey(
            r#"from="10.0.0.0/8,host.example.com",no-pty,environment="A=b c" ecdsa-sha2-nistp256 AAAAE2VjZHNh bob"#,
        )
        .unwrap();

        assert_eq!(key.options.len(), 3);
        assert_eq!(
            key.option("from").and_then(|o| o.value.as_deref()),
            Some("10.0.0.0/8,host.example.com")
        );
        assert_eq!(key.option("no-pty").map(|o| o.value.is_none()), Some(true));
        assert_eq!(
            key.option("environment").and_then(|o| o.value.as_deref()),
            Some("A=b c")
        );
        assert_eq!(key.key_type.as_deref(), Some("ecdsa-sha2-nistp256"));
        assert_eq!(key.key_data, "AAAAE2VjZHNh");
        assert_eq!(key.comment, "bob");
    }

    #[test]
    fn test_option_lookup_ignores_case() {
        let key = parse_pubkey(r#"FROM="*.example.com" ssh-ed25519 AAAA"#).unwrap();
        assert_eq!(
            key.option("from").and_then(|o| o.value.as_deref()),
            Some("*.example.com")
        );
    }

    #[test]
    fn test_unterminated_quote_is_malformed() {
        let err = parse_pubkey(r#"from="10.0.0.1,command="evil" ssh-rsa AAAA eve"#).unwrap_err();
        assert!(matches!(err, KeysError::MalformedKey(_)));

        let err = parse_pubkey(r#"from="10.0.0.1 ssh-rsa AAAA eve"#).unwrap_err();
        assert!(matches!(err, KeysError::MalformedKey(_)));
    }

    #[test]
    fn test_stray_quotes_are_malformed() {
        for line in [
            r#"from=a"b ssh-rsa AAAA"#,
            r#"from="a"b" ssh-rsa AAAA"#,
            r#"from="a\"b" ssh-rsa AAAA"#,
            r#"no-pty,,from="x" ssh-rsa AAAA"#,
            r#"bad_name ssh-rsa AAAA"#,
            r#"=x ssh-rsa AAAA"#,
        ] {
            assert!(
                matches!(parse_pubkey(line), Err(KeysError::MalformedKey(_))),
                "{line} should be rejected"
            );
        }
    }

    #[test]
    fn test_missing_fields() {
        for line in ["", "   ", "ssh-rsa", "no-pty ssh-rsa", "AAAA"] {
            assert!(
                matches!(parse_pubkey(line), Err(KeysError::MalformedKey(_))),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_legacy_key_without_type() {
        let key = parse_pubkey("1024 35 123456789 old@box").unwrap();
        assert!(key.options.is_empty());
        assert_eq!(key.key_type, None);
        assert_eq!(key.key_data, "1024");
        assert_eq!(key.comment, "35 123456789 old@box");
    }

    #[test]
    fn test_key_type_recognition() {
        for token in [
            "ssh-rsa",
            "ssh-dss",
            "ssh-ed25519",
            "ecdsa-sha2-nistp384",
            "sk-ssh-ed25519@openssh.com",
            "ssh-ed25519-cert-v01@openssh.com",
        ] {
            assert!(is_key_type(token), "{token}");
        }
        for token in ["no-pty", r#"from="a@b""#, "AAAAB3NzaC1yc2E", "1024"] {
            assert!(!is_key_type(token), "{token}");
        }
    }

    #[test]
    fn test_record_takes_username_from_caller() {
        let record = PublicKeyRecord::parse("alice", "ssh-ed25519 AAAA mallory").unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.key.comment, "mallory");
    }

    #[test]
    fn test_fingerprint() {
        let key = parse_pubkey(&format!("ssh-ed25519 {ED25519} github")).unwrap();
        assert_eq!(
            key.fingerprint().as_deref(),
            Some("SHA256:+DiY3wvvV6TuJJhbpZisF/zLDA0zPMSvHdkr4UvCOqU")
        );

        let key = parse_pubkey("ssh-rsa AAAAB3NzaC1yc2E fake").unwrap();
        assert_eq!(key.fingerprint(), None);
    }
}
