use serde_json::{Value, json};

/// Why an authentication attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopupError {
    /// `window.open` returned no handle, usually a popup blocker.
    #[error("Can't open window")]
    PopupBlocked,

    /// The popup was closed before a completion message arrived.
    #[error("Window closed before authentication completed")]
    UserCancelled,

    /// A newer `start()` superseded the attempt, or the controller was dropped.
    #[error("Authentication attempt was abandoned")]
    Abandoned,
}

impl PopupError {
    /// Diagnostic payload stored in the attempt state: `{ "message": ... }`.
    pub fn payload(&self) -> Value {
        json!({ "message": self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_payload_matches_legacy_message() {
        assert_eq!(
            PopupError::PopupBlocked.payload(),
            json!({ "message": "Can't open window" })
        );
    }

    #[test]
    fn cancelled_payload_describes_closed_window() {
        let payload = PopupError::UserCancelled.payload();
        let msg = payload["message"].as_str().unwrap();
        assert!(msg.contains("closed"));
    }
}
