//! The `hvml+run` URI scheme.
//!
//! Coroutines and channels are addressed as
//! `hvml+run://host/app/runner/(chan|crtn)/name`. The shorthand form
//! without a scheme (`host/app/runner/crtn/name`) is accepted as well, as
//! used by the `on` attribute of `<request>`. `~` denotes "current" and
//! `*` denotes "any" for the host, app and runner components.

use crate::error::{CoreError, CoreResult};

/// The scheme prefix for HVML resource URIs.
pub const HVML_RUN_SCHEME: &str = "hvml+run://";

/// What kind of resource an HVML URI addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HvmlResourceKind {
    /// A coroutine (`crtn`)
    Coroutine,
    /// A channel (`chan`)
    Channel,
}

impl HvmlResourceKind {
    fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "crtn" => Ok(HvmlResourceKind::Coroutine),
            "chan" => Ok(HvmlResourceKind::Channel),
            other => Err(CoreError::invalid_value(format!(
                "unknown HVML resource kind '{other}'"
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            HvmlResourceKind::Coroutine => "crtn",
            HvmlResourceKind::Channel => "chan",
        }
    }
}

/// A parsed HVML resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HvmlUri {
    /// Host component; `~` = current, `*` = any
    pub host: String,
    /// Application component
    pub app: String,
    /// Runner component
    pub runner: String,
    /// Whether the target is a coroutine or a channel
    pub kind: HvmlResourceKind,
    /// The resource token (coroutine token or channel name)
    pub name: String,
}

impl HvmlUri {
    /// Parses a full (`hvml+run://...`) or shorthand
    /// (`host/app/runner/kind/name`) HVML URI.
    pub fn parse(input: &str) -> CoreResult<Self> {
        let rest = input.strip_prefix(HVML_RUN_SCHEME).unwrap_or(input);

        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() != 5 {
            return Err(CoreError::invalid_value(format!(
                "HVML URI '{input}' must have host/app/runner/kind/name"
            )));
        }

        for (label, value) in ["host", "app", "runner", "name"]
            .iter()
            .zip([parts[0], parts[1], parts[2], parts[4]])
        {
            if value.is_empty() {
                return Err(CoreError::invalid_value(format!(
                    "empty {label} component in HVML URI '{input}'"
                )));
            }
        }

        Ok(HvmlUri {
            host: parts[0].to_string(),
            app: parts[1].to_string(),
            runner: parts[2].to_string(),
            kind: HvmlResourceKind::parse(parts[3])?,
            name: parts[4].to_string(),
        })
    }

    /// Reassembles the full URI form.
    pub fn assemble(&self) -> String {
        format!(
            "{}{}/{}/{}/{}/{}",
            HVML_RUN_SCHEME,
            self.host,
            self.app,
            self.runner,
            self.kind.as_str(),
            self.name
        )
    }

    /// True if the host component means "the current host".
    pub fn host_is_current(&self) -> bool {
        self.host == "~"
    }

    /// True if the app component means "the current app".
    pub fn app_is_current(&self) -> bool {
        self.app == "~"
    }

    /// True if the runner component means "the current runner".
    pub fn runner_is_current(&self) -> bool {
        self.runner == "~"
    }

    /// True if any of host/app/runner is the `*` wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.host == "*" || self.app == "*" || self.runner == "*"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_form() {
        let uri = HvmlUri::parse("hvml+run://localhost/cn.fmsoft.hvml.sample/main/crtn/7").unwrap();
        assert_eq!(uri.host, "localhost");
        assert_eq!(uri.app, "cn.fmsoft.hvml.sample");
        assert_eq!(uri.runner, "main");
        assert_eq!(uri.kind, HvmlResourceKind::Coroutine);
        assert_eq!(uri.name, "7");
    }

    #[test]
    fn test_parse_shorthand() {
        let uri = HvmlUri::parse("~/~/~/crtn/B").unwrap();
        assert!(uri.host_is_current());
        assert!(uri.app_is_current());
        assert!(uri.runner_is_current());
        assert_eq!(uri.kind, HvmlResourceKind::Coroutine);
        assert_eq!(uri.name, "B");
    }

    #[test]
    fn test_channel_and_wildcards() {
        let uri = HvmlUri::parse("*/app/worker/chan/events").unwrap();
        assert_eq!(uri.kind, HvmlResourceKind::Channel);
        assert!(uri.has_wildcard());
    }

    #[test]
    fn test_assemble_round_trip() {
        let input = "hvml+run://localhost/app/main/chan/log";
        let uri = HvmlUri::parse(input).unwrap();
        assert_eq!(uri.assemble(), input);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(HvmlUri::parse("hvml+run://only/three/parts").is_err());
        assert!(HvmlUri::parse("~/~/~/bogus/B").is_err());
        assert!(HvmlUri::parse("~//~/crtn/B").is_err());
    }
}
