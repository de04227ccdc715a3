//! Browser host backed by `web-sys`.

use super::{MessageHandler, Popup, PopupHost, PopupWindow, Subscription, TickHandler};
use crate::message::InboundMessage;
use crate::popup::{RawMetrics, Viewport};
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MessageEvent, Window};

/// A window opened with `window.open`.
pub struct BrowserPopup(Window);

impl PopupWindow for BrowserPopup {
    fn is_closed(&self) -> bool {
        self.0.closed().unwrap_or(true)
    }

    fn focus(&self) {
        let _ = self.0.focus();
    }
}

/// The page's own `window`.
#[derive(Clone)]
pub struct BrowserHost {
    window: Window,
}

impl BrowserHost {
    /// `None` outside a window context (e.g. in a worker).
    pub fn current() -> Option<Self> {
        web_sys::window().map(|window| Self { window })
    }

    fn raw_metrics(&self) -> RawMetrics {
        let w = &self.window;
        let root = w.document().and_then(|d| d.document_element());
        RawMetrics {
            screen_x: w.screen_x().ok().and_then(|v| v.as_f64()),
            screen_y: w.screen_y().ok().and_then(|v| v.as_f64()),
            screen_left: legacy_number(w, "screenLeft"),
            screen_top: legacy_number(w, "screenTop"),
            outer_width: w.outer_width().ok().and_then(|v| v.as_f64()),
            outer_height: w.outer_height().ok().and_then(|v| v.as_f64()),
            client_width: root.as_ref().map(|e| f64::from(e.client_width())).unwrap_or(0.0),
            client_height: root.as_ref().map(|e| f64::from(e.client_height())).unwrap_or(0.0),
            screen_width: w
                .screen()
                .and_then(|s| s.width())
                .map(f64::from)
                .unwrap_or(0.0),
        }
    }
}

// Older engines expose these without web-sys bindings.
fn legacy_number(window: &Window, name: &str) -> f64 {
    js_sys::Reflect::get(window, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

/// Structured-clone data as JSON; values JSON can't express become null.
fn message_data(event: &MessageEvent) -> Value {
    js_sys::JSON::stringify(&event.data())
        .ok()
        .and_then(|s| s.as_string())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(Value::Null)
}

impl PopupHost for BrowserHost {
    fn viewport(&self) -> Viewport {
        Viewport {
            user_agent: self.window.navigator().user_agent().unwrap_or_default(),
            metrics: self.raw_metrics().resolve(),
        }
    }

    fn open_window(&self, url: &str, target: &str, features: &str) -> Option<Popup> {
        match self
            .window
            .open_with_url_and_target_and_features(url, target, features)
        {
            Ok(Some(popup)) => Some(Rc::new(BrowserPopup(popup))),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(?err, "window.open threw");
                None
            }
        }
    }

    fn listen_messages(&self, mut handler: MessageHandler) -> Subscription {
        let callback = Closure::<dyn FnMut(MessageEvent)>::wrap(Box::new(move |event: MessageEvent| {
            handler(InboundMessage::new(event.origin(), message_data(&event)));
        }));
        if let Err(err) = self
            .window
            .add_event_listener_with_callback("message", callback.as_ref().unchecked_ref())
        {
            tracing::warn!(?err, "failed to add message listener");
            return Subscription::detached();
        }
        let window = self.window.clone();
        Subscription::new(move || {
            let _ = window
                .remove_event_listener_with_callback("message", callback.as_ref().unchecked_ref());
            drop(callback);
        })
    }

    fn set_interval(&self, period: Duration, mut tick: TickHandler) -> Subscription {
        let callback = Closure::<dyn FnMut()>::wrap(Box::new(move || tick()));
        let timeout = i32::try_from(period.as_millis()).unwrap_or(i32::MAX);
        let handle = match self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                timeout,
            ) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(?err, "failed to start interval");
                return Subscription::detached();
            }
        };
        let window = self.window.clone();
        Subscription::new(move || {
            window.clear_interval_with_handle(handle);
            drop(callback);
        })
    }
}
