//! Telling generated lines apart from hand-written ones

use regex::Regex;

use super::generate::{CARRY_THROUGH_OPTIONS, SAFETY_OPTIONS};
use super::MARKER;
use crate::config::ServeCommand;
use crate::error::Result;
use crate::keys::{parse_pubkey, KeyOption, USERNAME_PATTERN};

/// Origin of a line in an `authorized_keys` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Written by an administrator; kept byte for byte.
    Manual,
    /// Written by a previous run; dropped and regenerated.
    Autogenerated,
}

/// Recognizes lines produced by [`LineGenerator`](super::LineGenerator)
///
/// A line is autogenerated when it is the marker comment, or when its first
/// option is `command="[/path/]<serve> <user>"` with `<user>` following the
/// username grammar and every other option is one the generator itself
/// emits. Anything else, including lines that
/// cannot be parsed, is manual.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    command: Regex,
}

impl LineClassifier {
    pub fn new(serve: &ServeCommand) -> Result<Self> {
        let pattern = format!(
            r#"^(/[^ "]+/)?{} {USERNAME_PATTERN}$"#,
            regex::escape(serve.basename())
        );
        Ok(Self {
            command: Regex::new(&pattern)?,
        })
    }

    pub fn classify(&self, line: &str) -> LineKind {
        if line.trim_end() == MARKER {
            return LineKind::Autogenerated;
        }

        let key = match parse_pubkey(line) {
            Ok(key) => key,
            Err(_) => return LineKind::Manual,
        };

        let Some((first, rest)) = key.options.split_first() else {
            return LineKind::Manual;
        };

        let forced = first.is("command")
            && first
                .value
                .as_deref()
                .is_some_and(|command| self.command.is_match(command));

        if forced && only_generated_options(rest) {
            LineKind::Autogenerated
        } else {
            LineKind::Manual
        }
    }
}

// Each option the generator emits, at most once.
fn only_generated_options(options: &[KeyOption]) -> bool {
    let mut seen: Vec<&str> = Vec::with_capacity(options.len());
    for opt in options {
        let allowed = SAFETY_OPTIONS
            .iter()
            .find(|name| opt.is(name) && opt.value.is_none())
            .or_else(|| {
                CARRY_THROUGH_OPTIONS
                    .iter()
                    .find(|name| opt.is(name) && opt.value.is_some())
            });

        match allowed {
            Some(&name) if !seen.contains(&name) => seen.push(name),
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> LineClassifier {
        LineClassifier::new(&ServeCommand::default()).unwrap()
    }

    #[test]
    fn test_marker_is_autogenerated() {
        assert_eq!(classifier().classify(MARKER), LineKind::Autogenerated);
        assert_eq!(classifier().classify(&format!("{MARKER}\r")), LineKind::Autogenerated);
        assert_eq!(classifier().classify("### some other comment"), LineKind::Manual);
    }

    #[test]
    fn test_generated_lines() {
        let c = classifier();
        for line in [
            r#"command="gitosis-serve alice",no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty ssh-rsa AAAA alice@laptop"#,
            r#"command="/usr/bin/gitosis-serve carol",no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty ssh-rsa AAAA"#,
            r#"command="gitosis-serve bob",no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty,from="10.0.0.0/8" ssh-ed25519 AAAA bob"#,
            r#"command="gitosis-serve old" ssh-rsa AAAA legacy"#,
            r#"command="gitosis-serve dave",no-pty ssh-rsa AAAA"#,
        ] {
            assert_eq!(c.classify(line), LineKind::Autogenerated, "{line}");
        }
    }

    #[test]
    fn test_manual_lines() {
        let c = classifier();
        for line in [
            "",
            "# admin notes",
            "ssh-rsa AAAA root@console",
            r#"no-pty ssh-rsa AAAA root@console"#,
            r#"permitopen="x:1" ssh-rsa AAAA tunnel@host"#,
            r#"command="/bin/backup",no-pty ssh-rsa AAAA backup"#,
            r#"command="gitosis-serve alice; reboot",no-pty ssh-rsa AAAA"#,
            r#"command="gitosis-serve",no-pty ssh-rsa AAAA"#,
            r#"command="other-gitosis-serve alice",no-pty ssh-rsa AAAA"#,
            r#"command="bin/gitosis-serve alice",no-pty ssh-rsa AAAA"#,
            r#"no-pty,command="gitosis-serve alice" ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",environment="A=b" ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",command="gitosis-serve bob" ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",permitopen="x:1" ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",tunnel="0" ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",no-pty,no-pty ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",from="a",from="b" ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",from ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice",no-pty="yes" ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice,no-pty ssh-rsa AAAA"#,
            r#"command="gitosis-serve $(id)",no-pty ssh-rsa AAAA admin"#,
            r#"command="gitosis-serve `reboot`",no-pty ssh-rsa AAAA"#,
            r#"command="gitosis-serve alice|sh",no-pty ssh-rsa AAAA"#,
            r#"command="gitosis-serve ../etc",no-pty ssh-rsa AAAA"#,
            r#"command="gitosis-serve 1alice",no-pty ssh-rsa AAAA"#,
        ] {
            assert_eq!(c.classify(line), LineKind::Manual, "{line}");
        }
    }

    #[test]
    fn test_custom_serve_program() {
        let serve = ServeCommand::new("/opt/git/bin/git.serve").unwrap();
        let c = LineClassifier::new(&serve).unwrap();

        assert_eq!(
            c.classify(r#"command="/opt/git/bin/git.serve alice",no-pty ssh-rsa AAAA"#),
            LineKind::Autogenerated
        );
        assert_eq!(
            c.classify(r#"command="git.serve alice",no-pty ssh-rsa AAAA"#),
            LineKind::Autogenerated
        );
        // The dot is literal.
        assert_eq!(
            c.classify(r#"command="gitXserve alice",no-pty ssh-rsa AAAA"#),
            LineKind::Manual
        );
        assert_eq!(
            c.classify(r#"command="gitosis-serve alice",no-pty ssh-rsa AAAA"#),
            LineKind::Manual
        );
    }
}
