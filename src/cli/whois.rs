//! Username for a new public key

use crate::error::Result;
use crate::keys::user_from_pubkey;

use super::read_key_line;

pub fn run(line: Option<String>) -> Result<()> {
    let line = read_key_line(line)?;
    let user = user_from_pubkey(&line)?;
    tracing::debug!(%user, "username from key comment");

    println!("{}", user);
    Ok(())
}
