//! Events and request ids.
//!
//! Events are queued per destination coroutine and delivered FIFO per
//! `(observed, type, subtype)` key. The reduce option decides what
//! happens when an event with the same key is already pending.

use purc_core::atom::{Atom, BUCKET_DEFAULT};
use purc_variant::Variant;

/// Well-known event type atoms.
pub mod msg_type {
    use super::*;

    /// Fetcher progress and completion events.
    pub fn fetcher_state() -> Atom {
        Atom::from_static_str(BUCKET_DEFAULT, "fetcherState")
    }

    /// A request arriving from another coroutine.
    pub fn request() -> Atom {
        Atom::from_static_str(BUCKET_DEFAULT, "request")
    }

    /// The response to an earlier request.
    pub fn response() -> Atom {
        Atom::from_static_str(BUCKET_DEFAULT, "response")
    }

    /// A change to an observed variable.
    pub fn change() -> Atom {
        Atom::from_static_str(BUCKET_DEFAULT, "change")
    }

    /// An interval timer tick.
    pub fn timer_tick() -> Atom {
        Atom::from_static_str(BUCKET_DEFAULT, "timerTick")
    }

    /// A child coroutine finished.
    pub fn child_exit() -> Atom {
        Atom::from_static_str(BUCKET_DEFAULT, "corState")
    }
}

/// Well-known event subtypes.
pub mod msg_sub {
    /// Success subtype for fetcher completion.
    pub const SUCCESS: &str = "success";
    /// Error subtype for fetcher failure.
    pub const ERROR: &str = "error";
    /// Exit subtype for coroutine completion.
    pub const EXITED: &str = "exited";
}

/// What to do when an event with the same key is already queued.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventReduceOpt {
    /// Always queue
    Keep,
    /// Replace the pending event with the same key
    Overlay,
    /// Drop this event if one with the same key is pending
    Ignore,
}

/// A queued event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Where the event came from, when known
    pub source_uri: Option<String>,
    /// The destination coroutine id
    pub dest: Atom,
    /// Queue-reduction behavior
    pub reduce: EventReduceOpt,
    /// The observed value this event is about
    pub observed: Variant,
    /// The event type atom
    pub event_type: Atom,
    /// The event subtype; `None` matches any pattern
    pub subtype: Option<String>,
    /// The payload
    pub payload: Variant,
    /// The correlating request id, when the event answers a request
    pub request_id: Option<Variant>,
}

impl Event {
    /// Creates an event with the `Keep` reduce option.
    pub fn new(
        dest: Atom,
        observed: Variant,
        event_type: Atom,
        subtype: Option<&str>,
        payload: Variant,
    ) -> Event {
        Event {
            source_uri: None,
            dest,
            reduce: EventReduceOpt::Keep,
            observed,
            event_type,
            subtype: subtype.map(str::to_string),
            payload,
            request_id: None,
        }
    }

    /// True if both events carry the same `(observed, type, subtype)` key.
    pub fn same_key(&self, other: &Event) -> bool {
        self.event_type == other.event_type
            && self.subtype == other.subtype
            && self.observed.is_equal_to(&other.observed)
    }
}

/// What kind of resource a request id addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestIdKind {
    /// A coroutine
    Coroutine,
    /// A channel
    Channel,
    /// An async fetch
    Fetcher,
}

impl RequestIdKind {
    fn as_str(self) -> &'static str {
        match self {
            RequestIdKind::Coroutine => "crtn",
            RequestIdKind::Channel => "chan",
            RequestIdKind::Fetcher => "fetch",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "crtn" => Some(RequestIdKind::Coroutine),
            "chan" => Some(RequestIdKind::Channel),
            "fetch" => Some(RequestIdKind::Fetcher),
            _ => None,
        }
    }
}

/// A composite request id: `(kind, runner, coroutine, token)`. Encoded
/// as a string variant so it can cross instances and still match.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestId {
    /// What the request addresses
    pub kind: RequestIdKind,
    /// The issuing runner's atom
    pub runner: Atom,
    /// The issuing coroutine's id
    pub cid: Atom,
    /// Unique token within the coroutine
    pub token: u64,
}

impl RequestId {
    /// Encodes the id as a string variant.
    pub fn to_variant(self) -> Variant {
        Variant::string(&format!(
            "{}:{}:{}:{}",
            self.kind.as_str(),
            self.runner.raw(),
            self.cid.raw(),
            self.token
        ))
    }

    /// Decodes a string variant produced by [`RequestId::to_variant`].
    pub fn from_variant(value: &Variant) -> Option<RequestId> {
        let text = value.get_string()?;
        let mut parts = text.split(':');
        let kind = RequestIdKind::parse(parts.next()?)?;
        let runner = parts.next()?.parse::<u32>().ok()?;
        let cid = parts.next()?.parse::<u32>().ok()?;
        let token = parts.next()?.parse::<u64>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(RequestId {
            kind,
            runner: Atom::from_raw(runner),
            cid: Atom::from_raw(cid),
            token,
        })
    }

    /// True if two request-id variants denote the same request.
    pub fn variants_match(a: &Variant, b: &Variant) -> bool {
        match (RequestId::from_variant(a), RequestId::from_variant(b)) {
            (Some(a), Some(b)) => a == b,
            _ => a.is_equal_to(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key() {
        let dest = Atom::from_str("co-1");
        let a = Event::new(
            dest,
            Variant::string("watched"),
            msg_type::change(),
            Some("grown"),
            Variant::null(),
        );
        let mut b = a.clone();
        assert!(a.same_key(&b));

        b.subtype = Some("shrunk".to_string());
        assert!(!a.same_key(&b));
    }

    #[test]
    fn test_request_id_round_trip() {
        let id = RequestId {
            kind: RequestIdKind::Coroutine,
            runner: Atom::from_str("runner-main"),
            cid: Atom::from_str("co-7"),
            token: 99,
        };
        let encoded = id.to_variant();
        assert_eq!(RequestId::from_variant(&encoded), Some(id));
        assert!(RequestId::variants_match(&encoded, &id.to_variant()));
    }

    #[test]
    fn test_foreign_id_falls_back_to_equality() {
        let a = Variant::string("opaque-id");
        let b = Variant::string("opaque-id");
        let c = Variant::string("other");
        assert!(RequestId::variants_match(&a, &b));
        assert!(!RequestId::variants_match(&a, &c));
    }
}
