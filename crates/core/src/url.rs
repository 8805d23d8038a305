//! URL decomposition and assembly.
//!
//! [`BrokenDownUrl`] keeps every component as `Option<String>` so an empty
//! component ("http://host?#") stays distinguishable from an absent one
//! ("http://host"). Assembly reproduces the input up to default-port
//! elision; path components can be percent-encoded and -decoded per
//! RFC 3986.

use crate::error::{CoreError, CoreResult};

/// A URL broken into its components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokenDownUrl {
    /// The scheme without the trailing colon
    pub schema: Option<String>,
    /// The user name from the userinfo part
    pub username: Option<String>,
    /// The password from the userinfo part
    pub password: Option<String>,
    /// The host (registered name or address)
    pub host: Option<String>,
    /// The path, including its leading slash when present
    pub path: Option<String>,
    /// The query, without the leading question mark
    pub query: Option<String>,
    /// The fragment, without the leading hash
    pub fragment: Option<String>,
    /// The port, if one was given
    pub port: Option<u16>,
}

impl BrokenDownUrl {
    /// Parses `input` into components.
    pub fn break_down(input: &str) -> CoreResult<Self> {
        let mut url = BrokenDownUrl::default();
        let mut rest = input;

        // scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"
        if let Some(colon) = rest.find(':') {
            let candidate = &rest[..colon];
            if !candidate.is_empty()
                && candidate.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && candidate
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            {
                url.schema = Some(candidate.to_string());
                rest = &rest[colon + 1..];
            }
        }

        if url.schema.is_none() {
            return Err(CoreError::invalid_value(format!(
                "no scheme in URL '{input}'"
            )));
        }

        // fragment and query split off from the right first
        if let Some(hash) = rest.find('#') {
            url.fragment = Some(rest[hash + 1..].to_string());
            rest = &rest[..hash];
        }
        if let Some(qmark) = rest.find('?') {
            url.query = Some(rest[qmark + 1..].to_string());
            rest = &rest[..qmark];
        }

        // authority
        if let Some(after) = rest.strip_prefix("//") {
            let (authority, path) = match after.find('/') {
                Some(slash) => (&after[..slash], &after[slash..]),
                None => (after, ""),
            };

            let host_port = match authority.rfind('@') {
                Some(at) => {
                    let userinfo = &authority[..at];
                    match userinfo.split_once(':') {
                        Some((user, pass)) => {
                            url.username = Some(user.to_string());
                            url.password = Some(pass.to_string());
                        }
                        None => {
                            url.username = Some(userinfo.to_string());
                        }
                    }
                    &authority[at + 1..]
                }
                None => authority,
            };

            match host_port.rsplit_once(':') {
                Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
                    url.host = Some(host.to_string());
                    url.port = Some(port.parse::<u16>().map_err(|_| {
                        CoreError::invalid_value(format!("port out of range in '{input}'"))
                    })?);
                }
                _ => {
                    url.host = Some(host_port.to_string());
                }
            }

            if !path.is_empty() {
                url.path = Some(path.to_string());
            }
        } else if !rest.is_empty() {
            url.path = Some(rest.to_string());
        }

        Ok(url)
    }

    /// Reassembles the URL. Default ports for well-known schemes are
    /// elided.
    pub fn assemble(&self) -> String {
        let mut out = String::new();

        if let Some(schema) = &self.schema {
            out.push_str(schema);
            out.push(':');
        }

        if let Some(host) = &self.host {
            out.push_str("//");
            if let Some(user) = &self.username {
                out.push_str(user);
                if let Some(pass) = &self.password {
                    out.push(':');
                    out.push_str(pass);
                }
                out.push('@');
            }
            out.push_str(host);
            if let Some(port) = self.port {
                if Some(port) != self.default_port() {
                    out.push(':');
                    out.push_str(&port.to_string());
                }
            }
        }

        if let Some(path) = &self.path {
            out.push_str(path);
        }
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }

        out
    }

    /// Fetches a query value by key, percent-decoded.
    pub fn query_value(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        for pair in query.split('&') {
            let (k, v) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            if k == key {
                return percent_decode(v).ok();
            }
        }
        None
    }

    /// Returns true if the URL uses the `file` scheme.
    pub fn is_local_file(&self) -> bool {
        self.schema.as_deref() == Some("file")
    }

    fn default_port(&self) -> Option<u16> {
        match self.schema.as_deref() {
            Some("http") | Some("ws") => Some(80),
            Some("https") | Some("wss") => Some(443),
            Some("ftp") => Some(21),
            _ => None,
        }
    }
}

/// Percent-encodes a path, component by component, preserving slashes.
/// Unreserved characters (alphanumeric, `-`, `.`, `_`, `~`) pass through.
pub fn path_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char);
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Decodes percent-escapes in a path, preserving slashes.
pub fn path_decode(encoded: &str) -> CoreResult<String> {
    let decoded = percent_decode(encoded)?;
    Ok(decoded)
}

fn percent_decode(input: &str) -> CoreResult<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| CoreError::invalid_value("truncated percent escape"))?;
            let hi = hex_val(hex[0])?;
            let lo = hex_val(hex[1])?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| CoreError::bad_encoding(e.utf8_error().valid_up_to()))
}

fn hex_val(b: u8) -> CoreResult<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(CoreError::invalid_value("bad hex digit in percent escape")),
    }
}
