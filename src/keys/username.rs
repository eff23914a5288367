//! Username allow-list
//!
//! Usernames come from key file names and end up inside a forced command
//! in `authorized_keys`, so they are checked against a strict allow-list:
//!
//! ```text
//! letter (letter | digit | '_' | '.' | '-')* [ '@' letter (letter | digit | '.' | '-')* ]
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{KeysError, Result};

/// Unanchored username grammar, shared with the forced-command matcher.
pub(crate) const USERNAME_PATTERN: &str = r"[A-Za-z][A-Za-z0-9_.-]*(?:@[A-Za-z][A-Za-z0-9.-]*)?";

static SAFE_USERNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{USERNAME_PATTERN}$")).expect("username pattern compiles")
});

/// Check whether `candidate` is safe to use as an identity token.
pub fn is_safe_username(candidate: &str) -> bool {
    SAFE_USERNAME.is_match(candidate)
}

/// Derive a username from the comment of a public key line
///
/// The comment of a freshly generated key is conventionally `user@host`;
/// this is how the first admin key gets its file name.
pub fn user_from_pubkey(line: &str) -> Result<String> {
    let user = line
        .split_whitespace()
        .last()
        .ok_or_else(|| KeysError::malformed("empty public key line"))?;

    if is_safe_username(user) {
        Ok(user.to_string())
    } else {
        Err(KeysError::UnsafeIdentity(user.to_string()))
    }
}
