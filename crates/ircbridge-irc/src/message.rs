//! IRC line parsing and the outbound line builders.
//!
//! Only what the bridge needs: prefix, command, and parameters (with the
//! trailing `:` parameter). IRCv3 message tags are skipped.

use std::fmt;

/// One parsed IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    /// Source of the line, e.g. `nick!ident@host` or a server name.
    pub prefix: Option<String>,
    /// Command word or three-digit numeric, uppercased.
    pub command: String,
    pub params: Vec<String>,
}

impl IrcLine {
    /// Parses a line without its terminator. Returns `None` for blank lines.
    ///
    /// ```
    /// use ircbridge_irc::IrcLine;
    ///
    /// let line = IrcLine::parse(":peppy!peppy@ppy.sh PRIVMSG #osu :hello there").unwrap();
    /// assert_eq!(line.command, "PRIVMSG");
    /// assert_eq!(line.params, vec!["#osu", "hello there"]);
    /// assert_eq!(line.nick(), Some("peppy"));
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if let Some(tagged) = rest.strip_prefix('@') {
            rest = tagged.split_once(' ').map_or("", |(_, r)| r);
        }
        rest = rest.trim_start_matches(' ');

        let mut prefix = None;
        if let Some(prefixed) = rest.strip_prefix(':') {
            let (p, r) = prefixed.split_once(' ').unwrap_or((prefixed, ""));
            prefix = Some(p.to_string());
            rest = r.trim_start_matches(' ');
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, r) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = r;
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nickname part of the prefix. A server prefix is returned whole.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let end = prefix.find(['!', '@']).unwrap_or(prefix.len());
        Some(&prefix[..end])
    }

    /// `ident` from a `nick!ident@host` prefix.
    pub fn ident(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let (_, user_host) = prefix.split_once('!')?;
        Some(user_host.split_once('@').map_or(user_host, |(ident, _)| ident))
    }

    /// `host` from a `nick!ident@host` prefix.
    pub fn host(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        prefix.split_once('@').map(|(_, host)| host)
    }

    /// Numeric reply code, if the command is a three-digit numeric.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Parameter `n`, if present.
    pub fn param(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }
}

impl fmt::Display for IrcLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {param}")?;
            }
            write!(f, " :{last}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outbound builders
// ---------------------------------------------------------------------------

/// Removes line breaks so client text can't inject extra commands.
pub(crate) fn strip_line_breaks(s: &str) -> String {
    s.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// `PRIVMSG` lines for `message`, one per non-empty line of text.
pub(crate) fn privmsg_lines(target: &str, message: &str) -> Vec<String> {
    let target = strip_line_breaks(target);
    message
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .map(|line| format!("PRIVMSG {target} :{line}"))
        .collect()
}

pub(crate) fn join_line(channel: &str) -> String {
    format!("JOIN {}", strip_line_breaks(channel))
}

pub(crate) fn part_line(target: &str, reason: &str) -> String {
    let target = strip_line_breaks(target);
    if reason.is_empty() {
        format!("PART {target}")
    } else {
        format!("PART {target} :{}", strip_line_breaks(reason))
    }
}

pub(crate) fn quit_line(reason: &str) -> String {
    format!("QUIT :{}", strip_line_breaks(reason))
}
