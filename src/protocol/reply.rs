//! FTP replies
//!
//! A reply is a 3-digit numeric code, a space, and free text. Codes are
//! interpreted by their first digit: 1xx preliminary, 2xx complete,
//! 3xx intermediate (more input wanted), 4xx transient failure,
//! 5xx permanent failure.

use std::fmt;

use crate::error::FtpError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Parses one control-channel line into a reply.
    pub fn parse(line: &str) -> Result<Self, FtpError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.len() < 3 || !line.as_bytes()[..3].iter().all(u8::is_ascii_digit) {
            return Err(FtpError::Protocol(format!("unparsable reply: {line:?}")));
        }
        let code: u16 = line[..3]
            .parse()
            .map_err(|_| FtpError::Protocol(format!("unparsable reply code: {line:?}")))?;
        if !(100..600).contains(&code) {
            return Err(FtpError::Protocol(format!(
                "reply code out of range: {line:?}"
            )));
        }
        let text = line[3..].trim_start().to_string();
        Ok(Self { code, text })
    }

    /// 1xx: the requested action has started; another reply follows.
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 2xx: the requested action completed.
    pub fn is_complete(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx: the command was accepted but more input is needed (e.g. PASS).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 4xx or 5xx: the requested action was refused.
    pub fn is_failure(&self) -> bool {
        (400..600).contains(&self.code)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_and_text() {
        let reply = Reply::parse("230 Login successful.\r\n").unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "Login successful.");
    }

    #[test]
    fn parses_bare_code() {
        let reply = Reply::parse("221").unwrap();
        assert_eq!(reply.code, 221);
        assert_eq!(reply.text, "");
    }

    #[test]
    fn classifies_by_range() {
        assert!(Reply::new(150, "").is_preliminary());
        assert!(Reply::new(226, "").is_complete());
        assert!(Reply::new(331, "").is_intermediate());
        assert!(Reply::new(425, "").is_failure());
        assert!(Reply::new(530, "").is_failure());
        assert!(!Reply::new(230, "").is_failure());
    }

    #[test]
    fn rejects_garbage() {
        for line in ["", "hi", "2x0 nope", "999 out of range", "Login ok"] {
            assert!(Reply::parse(line).is_err(), "accepted {line:?}");
        }
    }

    #[test]
    fn round_trips_through_display() {
        let reply = Reply::new(227, "Entering Passive Mode (127,0,0,1,8,77)");
        assert_eq!(Reply::parse(&reply.to_string()).unwrap(), reply);
    }
}
