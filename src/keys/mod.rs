//! Public keys and where they come from
//!
//! - Username validation for key file names
//! - Parsing of OpenSSH public key lines
//! - Lazy scanning of a `keydir/*.pub` directory

mod pubkey;
mod scanner;
mod username;

pub use pubkey::{is_key_type, parse_pubkey, KeyOption, ParsedKey, PublicKeyRecord};
pub use scanner::{scan_keydir, KeyFileEntry, KeyLine, KeyScanner};
pub use username::{is_safe_username, user_from_pubkey};
pub(crate) use username::USERNAME_PATTERN;
