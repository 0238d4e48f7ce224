//! Notebook URL extraction
//!
//! The server writes a line like
//! `http://10.0.0.5:9700/?token=abc123` to its stderr once it is live.
//! This is the only place that understands that format.

use std::net::Ipv4Addr;

use regex::Regex;

use crate::error::ParseError;
use crate::types::ConnectionInfo;

/// Substring whose presence means the server has printed its credentials
pub const LIVE_MARKER: &str = "token";

const URL_PATTERN: &str = r"http://(\d{1,3}(?:\.\d{1,3}){3}):(\d{1,5})/\?token=([A-Za-z0-9]+)\b";

/// Extracts host, port and token from captured server output
#[derive(Debug, Clone)]
pub struct ConnectionInfoParser {
    url_regex: Regex,
}

impl ConnectionInfoParser {
    pub fn new() -> Self {
        Self {
            url_regex: Regex::new(URL_PATTERN).expect("notebook URL pattern is valid"),
        }
    }

    /// Whether `text` looks like the server has announced itself
    pub fn is_live(text: &str) -> bool {
        text.contains(LIVE_MARKER)
    }

    /// Parse the first well-formed notebook URL in `text`.
    ///
    /// Text without the live marker is `NotReady` and is never run through
    /// the regex. Candidates with an out-of-range octet or port are skipped.
    pub fn parse(&self, text: &str) -> Result<ConnectionInfo, ParseError> {
        if !Self::is_live(text) {
            return Err(ParseError::NotReady);
        }

        for caps in self.url_regex.captures_iter(text) {
            let host = &caps[1];
            if host.parse::<Ipv4Addr>().is_err() {
                continue;
            }
            let port = match caps[2].parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => continue,
            };
            return Ok(ConnectionInfo {
                host: host.to_string(),
                port,
                token: caps[3].to_string(),
            });
        }

        Err(ParseError::Malformed)
    }
}

impl Default for ConnectionInfoParser {
    fn default() -> Self {
        Self::new()
    }
}
