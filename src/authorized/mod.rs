//! The `authorized_keys` file
//!
//! - Classifying existing lines as manual or autogenerated
//! - Generating restricted forced-command lines
//! - Rewriting the file atomically

mod classify;
mod generate;
mod synthesize;

pub use classify::{LineClassifier, LineKind};
pub use generate::{display_comment, LineGenerator, CARRY_THROUGH_OPTIONS, SAFETY_OPTIONS};
pub use synthesize::{synthesize, write_atomically, Skipped, SynthesisReport, Synthesizer};

/// Marker line that opens the generated block.
pub const MARKER: &str = "### autogenerated by gitosis, DO NOT EDIT";
