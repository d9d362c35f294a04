//! Operator commands and their text form.
//!
//! Text commands are a verb followed by whitespace-separated arguments. Verbs
//! are case-insensitive and come in a long and a short spelling:
//!
//! | long                  | short     | arguments                      |
//! |-----------------------|-----------|--------------------------------|
//! | `whitelistadd`        | `wladd`   | `<ip>/<mask>`                  |
//! | `whitelistremove`     | `wlrm`    | `<ip>/<mask>`                  |
//! | `whitelistisin`       | `wlisin`  | `<ip>/<mask>`                  |
//! | `whitelistallin`      | `wlallin` |                                |
//! | `blacklistadd`        | `bladd`   | `<ip>/<mask>`                  |
//! | `blacklistremove`     | `blrm`    | `<ip>/<mask>`                  |
//! | `blacklistisin`       | `blisin`  | `<ip>/<mask>`                  |
//! | `blacklistallin`      | `blallin` |                                |
//! | `clearbucketforlogin` | `logincl` | `<login>`                      |
//! | `clearbucketforip`    | `ipcl`    | `<ip>`                         |
//! | `request`             |           | `<login> <password> <ip>`      |
//! | `health`              |           |                                |
//!
//! Arguments keep their case; only the verb is folded.

use crate::list::ListKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A password carried by a command. Its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Administrative and diagnostic commands understood by the router.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Evaluate an attempt exactly as the login path would.
    Check {
        /// Login name.
        login: String,
        /// Password.
        password: Secret,
        /// Source address.
        address: String,
    },
    /// Add an exact subnet to a list.
    AddAddress {
        /// Target list.
        list: ListKind,
        /// Network address.
        ip: String,
        /// Prefix length.
        mask: u8,
    },
    /// Remove an exact subnet from a list.
    RemoveAddress {
        /// Target list.
        list: ListKind,
        /// Network address.
        ip: String,
        /// Prefix length.
        mask: u8,
    },
    /// Exact-pair membership query.
    IsListed {
        /// Target list.
        list: ListKind,
        /// Network address.
        ip: String,
        /// Prefix length.
        mask: u8,
    },
    /// Enumerate a list.
    ListAll {
        /// Target list.
        list: ListKind,
    },
    /// Zero one login counter.
    ResetLogin {
        /// Login whose counter is zeroed.
        login: String,
    },
    /// Zero one address counter.
    ResetAddress {
        /// Address whose counter is zeroed.
        address: String,
    },
    /// Liveness probe.
    Health,
}

impl AdminCommand {
    /// Stable label used in audit records and history.
    pub fn label(&self) -> &'static str {
        match self {
            AdminCommand::Check { .. } => "check",
            AdminCommand::AddAddress { .. } => "add_address",
            AdminCommand::RemoveAddress { .. } => "remove_address",
            AdminCommand::IsListed { .. } => "is_listed",
            AdminCommand::ListAll { .. } => "list_all",
            AdminCommand::ResetLogin { .. } => "reset_login",
            AdminCommand::ResetAddress { .. } => "reset_address",
            AdminCommand::Health => "health",
        }
    }
}

/// Errors from parsing a text command.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseCommandError {
    /// Nothing but whitespace.
    #[error("empty command")]
    Empty,
    /// Verb not recognised.
    #[error("unsupported command: {0:?}")]
    Unsupported(String),
    /// Wrong number of arguments for the verb.
    #[error("bad argument count for {verb}: expected {expected}, got {got}")]
    BadArgCount {
        /// Verb as typed (lowercased).
        verb: String,
        /// Arguments the verb takes.
        expected: usize,
        /// Arguments given.
        got: usize,
    },
    /// An argument does not have the expected shape.
    #[error("bad argument: {0:?}")]
    BadArgument(String),
}

#[derive(Clone, Copy)]
enum SubnetOp {
    Add,
    Remove,
    IsIn,
}

fn expect_args(verb: &str, args: &[&str], expected: usize) -> Result<(), ParseCommandError> {
    if args.len() != expected {
        return Err(ParseCommandError::BadArgCount {
            verb: verb.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

fn split_subnet(arg: &str) -> Result<(String, u8), ParseCommandError> {
    let (ip, mask) =
        arg.split_once('/').ok_or_else(|| ParseCommandError::BadArgument(arg.to_string()))?;
    let mask = mask.parse().map_err(|_| ParseCommandError::BadArgument(arg.to_string()))?;
    Ok((ip.to_string(), mask))
}

fn subnet_command(
    verb: &str,
    args: &[&str],
    list: ListKind,
    op: SubnetOp,
) -> Result<AdminCommand, ParseCommandError> {
    expect_args(verb, args, 1)?;
    let (ip, mask) = split_subnet(args[0])?;
    Ok(match op {
        SubnetOp::Add => AdminCommand::AddAddress { list, ip, mask },
        SubnetOp::Remove => AdminCommand::RemoveAddress { list, ip, mask },
        SubnetOp::IsIn => AdminCommand::IsListed { list, ip, mask },
    })
}

impl FromStr for AdminCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ParseCommandError::Empty)?.to_ascii_lowercase();
        let args: Vec<&str> = words.collect();
        let v = verb.as_str();

        match v {
            "whitelistadd" | "wladd" => subnet_command(v, &args, ListKind::Allow, SubnetOp::Add),
            "whitelistremove" | "wlrm" => {
                subnet_command(v, &args, ListKind::Allow, SubnetOp::Remove)
            }
            "whitelistisin" | "wlisin" => subnet_command(v, &args, ListKind::Allow, SubnetOp::IsIn),
            "blacklistadd" | "bladd" => subnet_command(v, &args, ListKind::Deny, SubnetOp::Add),
            "blacklistremove" | "blrm" => subnet_command(v, &args, ListKind::Deny, SubnetOp::Remove),
            "blacklistisin" | "blisin" => subnet_command(v, &args, ListKind::Deny, SubnetOp::IsIn),
            "whitelistallin" | "wlallin" => {
                expect_args(v, &args, 0)?;
                Ok(AdminCommand::ListAll { list: ListKind::Allow })
            }
            "blacklistallin" | "blallin" => {
                expect_args(v, &args, 0)?;
                Ok(AdminCommand::ListAll { list: ListKind::Deny })
            }
            "clearbucketforlogin" | "logincl" => {
                expect_args(v, &args, 1)?;
                Ok(AdminCommand::ResetLogin { login: args[0].to_string() })
            }
            "clearbucketforip" | "ipcl" => {
                expect_args(v, &args, 1)?;
                Ok(AdminCommand::ResetAddress { address: args[0].to_string() })
            }
            "request" => {
                expect_args(v, &args, 3)?;
                Ok(AdminCommand::Check {
                    login: args[0].to_string(),
                    password: Secret::new(args[1]),
                    address: args[2].to_string(),
                })
            }
            "health" => {
                expect_args(v, &args, 0)?;
                Ok(AdminCommand::Health)
            }
            _ => Err(ParseCommandError::Unsupported(v.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_and_short_verbs_agree() {
        let pairs = [
            ("whitelistadd 10.0.0.0/8", "wladd 10.0.0.0/8"),
            ("WhitelistRemove 10.0.0.0/8", "wlrm 10.0.0.0/8"),
            ("blacklistisin 10.0.0.0/8", "BLISIN 10.0.0.0/8"),
            ("blacklistallin", "blallin"),
            ("clearbucketforip 10.0.0.1", "ipcl 10.0.0.1"),
        ];
        for (long, short) in pairs {
            assert_eq!(long.parse::<AdminCommand>(), short.parse::<AdminCommand>(), "{long}");
        }
    }

    #[test]
    fn arguments_keep_their_case() {
        let cmd: AdminCommand = "request Alice S3cret 192.0.2.1".parse().unwrap();
        match cmd {
            AdminCommand::Check { login, password, address } => {
                assert_eq!(login, "Alice");
                assert_eq!(password.expose(), "S3cret");
                assert_eq!(address, "192.0.2.1");
            }
            other => panic!("unexpected {other:?}"),
        }
        let cmd: AdminCommand = "logincl Bob".parse().unwrap();
        assert_eq!(cmd, AdminCommand::ResetLogin { login: "Bob".into() });
    }

    #[test]
    fn subnet_arguments_are_split() {
        let cmd: AdminCommand = "bladd 192.168.64.0/24".parse().unwrap();
        assert_eq!(
            cmd,
            AdminCommand::AddAddress { list: ListKind::Deny, ip: "192.168.64.0".into(), mask: 24 }
        );
        assert_eq!(cmd.label(), "add_address");
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!("   ".parse::<AdminCommand>(), Err(ParseCommandError::Empty));
        assert_eq!(
            "flushall".parse::<AdminCommand>(),
            Err(ParseCommandError::Unsupported("flushall".into()))
        );
        assert_eq!(
            "wladd".parse::<AdminCommand>(),
            Err(ParseCommandError::BadArgCount { verb: "wladd".into(), expected: 1, got: 0 })
        );
        assert_eq!(
            "wladd 10.0.0.0".parse::<AdminCommand>(),
            Err(ParseCommandError::BadArgument("10.0.0.0".into()))
        );
        assert!("request a b".parse::<AdminCommand>().is_err());
    }

    #[test]
    fn debug_output_hides_passwords() {
        let cmd: AdminCommand = "request alice hunter2 192.0.2.1".parse().unwrap();
        assert!(!format!("{cmd:?}").contains("hunter2"));
    }

    #[test]
    fn json_form_uses_cmd_tag_and_list_aliases() {
        let cmd: AdminCommand =
            serde_json::from_str(r#"{"cmd":"add_address","list":"blacklist","ip":"10.0.0.0","mask":8}"#)
                .unwrap();
        assert_eq!(
            cmd,
            AdminCommand::AddAddress { list: ListKind::Deny, ip: "10.0.0.0".into(), mask: 8 }
        );
        let json = serde_json::to_value(AdminCommand::Health).unwrap();
        assert_eq!(json, serde_json::json!({"cmd": "health"}));
    }
}
