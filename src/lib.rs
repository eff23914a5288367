//! gitosis-keys - restricted authorized_keys generation for gitosis
//!
//! This crate turns a directory of per-user SSH public keys into the
//! `authorized_keys` file read by sshd:
//! - Every key is wrapped in a forced command that only runs the serving program
//! - Options from key files are dropped, except for `from=`
//! - Lines an administrator added by hand are kept across regenerations
//! - The file is replaced atomically

pub mod authorized;
pub mod cli;
pub mod config;
pub mod error;
pub mod keys;

pub use authorized::{synthesize, LineKind, SynthesisReport, Synthesizer, MARKER};
pub use error::{KeysError, Result};
