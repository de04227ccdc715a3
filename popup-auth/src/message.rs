use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A cross-window message as delivered to the hosting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Serialized origin of the sender, e.g. `https://provider.example`.
    pub origin: String,
    pub data: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Why a message was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    MissingSource,
    WrongSource,
    ForeignOrigin,
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Discard::MissingSource => "no source field",
            Discard::WrongSource => "unexpected source",
            Discard::ForeignOrigin => "foreign origin",
        };
        f.write_str(s)
    }
}

/// Decides which messages complete an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFilter {
    source: String,
    origin: Option<String>,
}

impl MessageFilter {
    /// Accept messages whose `source` equals `source`, from any origin.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            origin: None,
        }
    }

    /// Additionally require the sender origin to equal `origin`.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn expected_origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns the message's `payload` field (null when absent) if it matches.
    pub fn accept(&self, message: &InboundMessage) -> Result<Value, Discard> {
        let source = message
            .data
            .get("source")
            .and_then(Value::as_str)
            .ok_or(Discard::MissingSource)?;
        if source != self.source {
            return Err(Discard::WrongSource);
        }
        if let Some(expected) = &self.origin {
            if message.origin != *expected {
                return Err(Discard::ForeignOrigin);
            }
        }
        Ok(message.data.get("payload").cloned().unwrap_or(Value::Null))
    }
}

/// Origin of `url` as browsers serialize it, or `None` for opaque origins
/// and unparseable input.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PROVIDER: &str = "https://provider.example";

    #[test]
    fn accepts_matching_source_and_returns_payload() {
        let filter = MessageFilter::new("oauth");
        let msg = InboundMessage::new(
            PROVIDER,
            json!({"source": "oauth", "payload": {"token": "abc"}}),
        );
        assert_eq!(filter.accept(&msg), Ok(json!({"token": "abc"})));
    }

    #[test]
    fn missing_payload_is_null() {
        let filter = MessageFilter::new("oauth");
        let msg = InboundMessage::new(PROVIDER, json!({"source": "oauth"}));
        assert_eq!(filter.accept(&msg), Ok(Value::Null));
    }

    #[test]
    fn rejects_other_sources() {
        let filter = MessageFilter::new("oauth");
        let devtools = InboundMessage::new(PROVIDER, json!({"source": "react-devtools"}));
        assert_eq!(filter.accept(&devtools), Err(Discard::WrongSource));

        let not_object = InboundMessage::new(PROVIDER, json!("hello"));
        assert_eq!(filter.accept(&not_object), Err(Discard::MissingSource));

        let numeric = InboundMessage::new(PROVIDER, json!({"source": 1}));
        assert_eq!(filter.accept(&numeric), Err(Discard::MissingSource));
    }

    #[test]
    fn origin_check_is_opt_in() {
        let msg = InboundMessage::new("https://evil.example", json!({"source": "oauth"}));
        assert_eq!(MessageFilter::new("oauth").expected_origin(), None);
        assert_eq!(
            MessageFilter::new("oauth").with_origin(PROVIDER).expected_origin(),
            Some(PROVIDER)
        );
        assert!(MessageFilter::new("oauth").accept(&msg).is_ok());
        assert_eq!(
            MessageFilter::new("oauth").with_origin(PROVIDER).accept(&msg),
            Err(Discard::ForeignOrigin)
        );
    }

    #[test]
    fn origin_of_strips_path_and_default_port() {
        assert_eq!(
            origin_of("https://provider.example:443/auth?x=1").as_deref(),
            Some("https://provider.example")
        );
        assert_eq!(
            origin_of("http://localhost:8080/cb").as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(origin_of("/relative/path"), None);
        assert_eq!(origin_of("data:text/plain,hi"), None);
    }
}
