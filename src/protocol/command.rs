//! FTP command parsing
//!
//! One control-channel line becomes one `Command`: the first
//! whitespace-delimited token is the verb (case-insensitive), the remainder
//! is the argument. Verbs that require an argument parse to
//! `Command::MissingArgument` when it is absent so the dispatcher can answer
//! with a 501 instead of a 500.

use std::fmt;

/// A parsed FTP command. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    Syst,
    Pwd,
    Cwd(String),
    Cdup,
    Pasv,
    Epsv,
    Port(String),
    Eprt(String),
    List(Option<String>),
    Retr(String),
    Stor(String),
    Quit,
    /// A known verb missing its required argument.
    MissingArgument(&'static str),
    /// Anything else; carries the offending verb for logging.
    Unknown(String),
}

/// Parses a raw control-channel line into a `Command`.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim();

    let require = |name: &'static str, make: fn(String) -> Command| {
        if arg.is_empty() {
            Command::MissingArgument(name)
        } else {
            make(arg.to_string())
        }
    };

    match verb.as_str() {
        "USER" => require("USER", Command::User),
        "PASS" => require("PASS", Command::Pass),
        "SYST" => Command::Syst,
        "PWD" => Command::Pwd,
        "CWD" => require("CWD", Command::Cwd),
        "CDUP" => Command::Cdup,
        "PASV" => Command::Pasv,
        "EPSV" => Command::Epsv,
        "PORT" => require("PORT", Command::Port),
        "EPRT" => require("EPRT", Command::Eprt),
        "LIST" => Command::List((!arg.is_empty()).then(|| arg.to_string())),
        "RETR" => require("RETR", Command::Retr),
        "STOR" => require("STOR", Command::Stor),
        "QUIT" => Command::Quit,
        _ => Command::Unknown(verb),
    }
}

impl fmt::Display for Command {
    /// Wire form of the command, without the line terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::User(u) => write!(f, "USER {u}"),
            Command::Pass(p) => write!(f, "PASS {p}"),
            Command::Syst => write!(f, "SYST"),
            Command::Pwd => write!(f, "PWD"),
            Command::Cwd(p) => write!(f, "CWD {p}"),
            Command::Cdup => write!(f, "CDUP"),
            Command::Pasv => write!(f, "PASV"),
            Command::Epsv => write!(f, "EPSV"),
            Command::Port(a) => write!(f, "PORT {a}"),
            Command::Eprt(a) => write!(f, "EPRT {a}"),
            Command::List(None) => write!(f, "LIST"),
            Command::List(Some(p)) => write!(f, "LIST {p}"),
            Command::Retr(n) => write!(f, "RETR {n}"),
            Command::Stor(n) => write!(f, "STOR {n}"),
            Command::Quit => write!(f, "QUIT"),
            Command::MissingArgument(v) => write!(f, "{v}"),
            Command::Unknown(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verbs_case_insensitively() {
        assert_eq!(parse_command("user alice"), Command::User("alice".into()));
        assert_eq!(parse_command("QUIT\r\n"), Command::Quit);
        assert_eq!(parse_command("Pasv"), Command::Pasv);
        assert_eq!(
            parse_command("RETR notes.txt"),
            Command::Retr("notes.txt".into())
        );
    }

    #[test]
    fn list_argument_is_optional() {
        assert_eq!(parse_command("LIST"), Command::List(None));
        assert_eq!(parse_command("LIST pub"), Command::List(Some("pub".into())));
    }

    #[test]
    fn missing_arguments_are_flagged() {
        assert_eq!(parse_command("CWD"), Command::MissingArgument("CWD"));
        assert_eq!(parse_command("STOR  "), Command::MissingArgument("STOR"));
        assert_eq!(parse_command("USER"), Command::MissingArgument("USER"));
    }

    #[test]
    fn unknown_verbs_are_preserved() {
        assert_eq!(parse_command("NOOP"), Command::Unknown("NOOP".into()));
        assert_eq!(parse_command(""), Command::Unknown("".into()));
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(parse_command("CWD /pub").to_string(), "CWD /pub");
        assert_eq!(Command::List(None).to_string(), "LIST");
    }
}
