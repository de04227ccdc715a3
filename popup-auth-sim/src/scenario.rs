//! Scripted popup sessions against the in-memory host.

use futures::FutureExt;
use popup_auth::host::sim::OpenRecord;
use popup_auth::message::origin_of;
use popup_auth::{
    AttemptState, AuthPopup, PopupConfig, PopupError, ScreenMetrics, SimHost, StartOptions,
    Viewport, WindowFeatures, WindowSize,
};
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";

/// Something that happens to the popup at a point in virtual time.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The provider page posts its completion message.
    Complete { origin: Option<String>, payload: Value },
    /// Unrelated traffic, e.g. a browser extension.
    Foreign { origin: Option<String> },
    /// The user closes the popup.
    Close,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub url: String,
    pub options: StartOptions,
    pub mobile: bool,
    pub blocked: bool,
    pub steps: Vec<(Duration, Step)>,
    /// Give up after this much virtual time.
    pub limit: Duration,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Resolved { payload: Value },
    Rejected { error: String, payload: Value },
    Pending,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub outcome: Outcome,
    pub state: AttemptState,
    pub opened: Vec<OpenRecord>,
    pub elapsed_ms: u64,
}

pub fn run(config: PopupConfig, scenario: Scenario) -> Report {
    let host = Rc::new(SimHost::new());
    if scenario.mobile {
        host.set_user_agent(MOBILE_USER_AGENT);
    }
    host.set_block_popups(scenario.blocked);

    let auth = AuthPopup::with_config(Rc::clone(&host), config);
    let tick = auth.config().poll_interval().max(Duration::from_millis(1));
    let mut future = auth.start(&scenario.url, scenario.options.clone());
    let mut result = (&mut future).now_or_never();

    let default_origin = origin_of(&scenario.url).unwrap_or_else(|| "null".to_string());
    let mut steps = scenario.steps.clone();
    steps.sort_by_key(|(at, _)| *at);

    for (at, step) in steps {
        if result.is_some() || at > scenario.limit {
            break;
        }
        host.advance(at.saturating_sub(host.now()));
        tracing::debug!(at_ms = at.as_millis() as u64, ?step, "applying step");
        match step {
            Step::Complete { origin, payload } => {
                let origin = origin.unwrap_or_else(|| default_origin.clone());
                host.post_message(&origin, serde_json::json!({ "source": "oauth", "payload": payload }));
            }
            Step::Foreign { origin } => {
                let origin = origin.unwrap_or_else(|| default_origin.clone());
                host.post_message(&origin, serde_json::json!({ "source": "extension", "ping": true }));
            }
            Step::Close => host.close_popup(),
        }
        result = (&mut future).now_or_never();
    }

    while result.is_none() && host.now() < scenario.limit {
        host.advance(tick.min(scenario.limit - host.now()));
        result = (&mut future).now_or_never();
    }

    let outcome = match result {
        Some(Ok(payload)) => Outcome::Resolved { payload },
        Some(Err(err)) => rejected(err),
        None => Outcome::Pending,
    };

    Report {
        outcome,
        state: auth.state(),
        opened: host.opened(),
        elapsed_ms: host.now().as_millis() as u64,
    }
}

/// The `window.open` feature string a browser with these metrics would get.
pub fn features(user_agent: &str, metrics: ScreenMetrics, size: WindowSize) -> String {
    let viewport = Viewport {
        user_agent: user_agent.to_string(),
        metrics,
    };
    WindowFeatures::for_viewport(&viewport, size).to_string()
}

fn rejected(err: PopupError) -> Outcome {
    Outcome::Rejected {
        error: format!("{:?}", err),
        payload: err.payload(),
    }
}
