use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of the current authentication attempt.
///
/// Replaced wholesale on every transition. All flags false means no attempt
/// has been started yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptState {
    pub is_loading: bool,
    pub is_cancelled: bool,
    pub is_completed: bool,
    pub is_error: bool,
    /// Provider result on completion, `{ "message": ... }` on cancel/error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Coarse view of an [`AttemptState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Completed,
    Cancelled,
    Error,
}

impl AttemptState {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Loading
        } else if self.is_completed {
            Phase::Completed
        } else if self.is_cancelled {
            Phase::Cancelled
        } else if self.is_error {
            Phase::Error
        } else {
            Phase::Idle
        }
    }

    /// True once the attempt reached completed, cancelled or error.
    pub fn is_settled(&self) -> bool {
        self.is_completed || self.is_cancelled || self.is_error
    }
}

/// Input to [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEvent {
    Start,
    Complete(Value),
    Cancel(Value),
    Error(Value),
}

impl AttemptEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AttemptEvent::Start => "start",
            AttemptEvent::Complete(_) => "complete",
            AttemptEvent::Cancel(_) => "cancel",
            AttemptEvent::Error(_) => "error",
        }
    }
}

/// Pure state transition.
///
/// `Start` always resets to loading. Terminal events only apply to a loading
/// state; anywhere else they leave the state untouched.
pub fn reduce(state: &AttemptState, event: AttemptEvent) -> AttemptState {
    if let AttemptEvent::Start = event {
        return AttemptState::loading();
    }
    if !state.is_loading {
        return state.clone();
    }
    match event {
        AttemptEvent::Start => AttemptState::loading(),
        AttemptEvent::Complete(payload) => AttemptState {
            is_completed: true,
            payload: Some(payload),
            ..AttemptState::default()
        },
        AttemptEvent::Cancel(payload) => AttemptState {
            is_cancelled: true,
            payload: Some(payload),
            ..AttemptState::default()
        },
        AttemptEvent::Error(payload) => AttemptState {
            is_error: true,
            payload: Some(payload),
            ..AttemptState::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn terminal_flags(s: &AttemptState) -> usize {
        [s.is_completed, s.is_cancelled, s.is_error]
            .iter()
            .filter(|f| **f)
            .count()
    }

    #[test]
    fn initial_state_is_idle() {
        let s = AttemptState::default();
        assert!(!s.is_loading);
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.payload.is_none());
    }

    #[test]
    fn start_discards_previous_terminal_state() {
        let done = AttemptState {
            is_completed: true,
            payload: Some(json!({"token": "abc"})),
            ..AttemptState::default()
        };
        let next = reduce(&done, AttemptEvent::Start);
        assert_eq!(next, AttemptState::loading());
    }

    #[test]
    fn each_terminal_event_sets_exactly_one_flag() {
        let loading = AttemptState::loading();
        for event in [
            AttemptEvent::Complete(json!({"token": "abc"})),
            AttemptEvent::Cancel(json!({"message": "closed"})),
            AttemptEvent::Error(json!({"message": "blocked"})),
        ] {
            let s = reduce(&loading, event);
            assert!(!s.is_loading);
            assert_eq!(terminal_flags(&s), 1);
            assert!(s.is_settled());
            assert!(s.payload.is_some());
        }
    }

    #[test]
    fn complete_carries_payload() {
        let s = reduce(
            &AttemptState::loading(),
            AttemptEvent::Complete(json!({"token": "abc"})),
        );
        assert_eq!(s.phase(), Phase::Completed);
        assert_eq!(s.payload, Some(json!({"token": "abc"})));
    }

    #[test]
    fn terminal_events_after_settlement_are_ignored() {
        let cancelled = reduce(
            &AttemptState::loading(),
            AttemptEvent::Cancel(json!({"message": "closed"})),
        );
        let after = reduce(&cancelled, AttemptEvent::Complete(json!({"token": "late"})));
        assert_eq!(after, cancelled);

        assert!(!AttemptState::loading().is_settled());
        let idle = AttemptState::default();
        assert!(!idle.is_settled());
        assert_eq!(reduce(&idle, AttemptEvent::Error(json!(null))), idle);
    }

    #[test]
    fn serializes_with_camel_case_flags() {
        let s = AttemptState::loading();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(
            v,
            json!({
                "isLoading": true,
                "isCancelled": false,
                "isCompleted": false,
                "isError": false
            })
        );
    }
}
