//! Popup authentication lifecycle.
//!
//! One attempt at a time: `start` opens the popup, then a message listener and
//! a liveness poll race to settle it. Whichever callback runs first wins; the
//! other finds the attempt settled and does nothing.

use crate::config::PopupConfig;
use crate::error::PopupError;
use crate::host::{Popup, PopupHost, Subscription};
use crate::message::{InboundMessage, MessageFilter, origin_of};
use crate::popup::{WindowSize, open_popup};
use crate::state::{AttemptEvent, AttemptState, reduce};
use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

/// Per-call options for [`AuthPopup::start`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Popup size; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowSize>,
}

impl StartOptions {
    pub fn with_window(width: u32, height: u32) -> Self {
        Self {
            window: Some(WindowSize::new(width, height)),
        }
    }
}

type Reply = oneshot::Sender<Result<Value, PopupError>>;
type Observer = Rc<dyn Fn(&AttemptState)>;

/// Deferred result of [`AuthPopup::start`].
///
/// Resolves with the provider payload, or fails with the reason the attempt
/// ended. Dropping it does not cancel the attempt.
#[must_use = "the attempt outcome is only observable through this future"]
pub struct AuthFuture {
    rx: oneshot::Receiver<Result<Value, PopupError>>,
}

impl Future for AuthFuture {
    type Output = Result<Value, PopupError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(PopupError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct Attempt {
    id: u64,
    settled: bool,
    popup: Popup,
    filter: MessageFilter,
    reply: Option<Reply>,
    listener: Option<Subscription>,
    poll: Option<Subscription>,
}

#[derive(Default)]
struct Inner {
    state: AttemptState,
    popup: Option<Popup>,
    attempt: Option<Attempt>,
    next_id: u64,
    observers: Vec<Observer>,
}

type Shared = Rc<RefCell<Inner>>;

/// Opens a provider page in a popup and reports how the attempt ended.
///
/// Cheap to clone; clones share the same attempt. Single-threaded:
/// all callbacks run on the host's event loop.
pub struct AuthPopup<H: PopupHost> {
    host: Rc<H>,
    config: Rc<PopupConfig>,
    inner: Shared,
}

impl<H: PopupHost> Clone for AuthPopup<H> {
    fn clone(&self) -> Self {
        Self {
            host: Rc::clone(&self.host),
            config: Rc::clone(&self.config),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: PopupHost + 'static> AuthPopup<H> {
    pub fn new(host: Rc<H>) -> Self {
        Self::with_config(host, PopupConfig::default())
    }

    pub fn with_config(host: Rc<H>, config: PopupConfig) -> Self {
        Self {
            host,
            config: Rc::new(config),
            inner: Rc::new(RefCell::new(Inner::default())),
        }
    }

    pub fn config(&self) -> &PopupConfig {
        &self.config
    }

    /// Current state snapshot.
    pub fn state(&self) -> AttemptState {
        self.inner.borrow().state.clone()
    }

    /// Call `observer` after every state transition.
    pub fn subscribe(&self, observer: impl Fn(&AttemptState) + 'static) {
        self.inner.borrow_mut().observers.push(Rc::new(observer));
    }

    /// Open `provider_url` in a popup and wait for the provider to post back.
    ///
    /// A previous attempt still in flight is superseded: its registrations are
    /// released and its future fails with [`PopupError::Abandoned`].
    pub fn start(&self, provider_url: &str, options: StartOptions) -> AuthFuture {
        let (reply, rx) = oneshot::channel();
        let future = AuthFuture { rx };

        let (id, superseded) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            (id, inner.attempt.take())
        };
        if let Some(old) = superseded {
            if !old.settled {
                tracing::info!(attempt = old.id, "superseding unsettled attempt");
            }
            drop(old);
        }

        transition(&self.inner, AttemptEvent::Start);
        tracing::info!(attempt = id, url = provider_url, "starting popup authentication");

        let size = options.window.unwrap_or(self.config.default_window);
        let popup = open_popup(&*self.host, provider_url, &self.config.title, size);
        self.inner.borrow_mut().popup = popup.clone();

        let Some(popup) = popup else {
            let err = PopupError::PopupBlocked;
            tracing::warn!(attempt = id, "popup was blocked");
            transition(&self.inner, AttemptEvent::Error(err.payload()));
            let _ = reply.send(Err(err));
            return future;
        };

        let filter = self.message_filter(provider_url);
        tracing::debug!(
            attempt = id,
            origin = ?filter.expected_origin(),
            "listening for provider message"
        );

        let weak = Rc::downgrade(&self.inner);
        let listener = self.host.listen_messages(Box::new(move |message| {
            if let Some(inner) = Weak::upgrade(&weak) {
                on_message(&inner, id, message);
            }
        }));

        let weak = Rc::downgrade(&self.inner);
        let poll = self.host.set_interval(
            self.config.poll_interval(),
            Box::new(move || {
                if let Some(inner) = Weak::upgrade(&weak) {
                    on_poll(&inner, id);
                }
            }),
        );

        self.inner.borrow_mut().attempt = Some(Attempt {
            id,
            settled: false,
            popup,
            filter,
            reply: Some(reply),
            listener: Some(listener),
            poll: Some(poll),
        });

        future
    }

    /// Bring the popup to the foreground if it is still open.
    pub fn focus(&self) {
        let popup = self.inner.borrow().popup.clone();
        if let Some(popup) = popup {
            if !popup.is_closed() {
                popup.focus();
            }
        }
    }

    fn message_filter(&self, provider_url: &str) -> MessageFilter {
        let filter = MessageFilter::new(self.config.message_source.clone());
        if !self.config.verify_origin {
            return filter;
        }
        match origin_of(provider_url) {
            Some(origin) => filter.with_origin(origin),
            None => {
                tracing::warn!(
                    url = provider_url,
                    "provider URL has no tuple origin; accepting messages from any origin"
                );
                filter
            }
        }
    }
}

fn transition(shared: &Shared, event: AttemptEvent) {
    let name = event.name();
    let (state, observers) = {
        let mut inner = shared.borrow_mut();
        inner.state = reduce(&inner.state, event);
        (inner.state.clone(), inner.observers.clone())
    };
    tracing::debug!(
        event = name,
        phase = ?state.phase(),
        settled = state.is_settled(),
        "attempt transition"
    );
    for observer in observers {
        observer(&state);
    }
}

fn on_message(shared: &Shared, id: u64, message: InboundMessage) {
    let (payload, reply, released) = {
        let mut inner = shared.borrow_mut();
        let Some(attempt) = inner
            .attempt
            .as_mut()
            .filter(|a| a.id == id && !a.settled)
        else {
            return;
        };
        let payload = match attempt.filter.accept(&message) {
            Ok(payload) => payload,
            Err(reason) => {
                tracing::debug!(attempt = id, origin = %message.origin, %reason, "ignoring message");
                return;
            }
        };
        attempt.settled = true;
        (
            payload,
            attempt.reply.take(),
            (attempt.listener.take(), attempt.poll.take()),
        )
    };
    drop(released);

    tracing::info!(attempt = id, "popup authentication completed");
    transition(shared, AttemptEvent::Complete(payload.clone()));
    if let Some(reply) = reply {
        let _ = reply.send(Ok(payload));
    }
}

fn on_poll(shared: &Shared, id: u64) {
    let (reply, released) = {
        let mut inner = shared.borrow_mut();
        let Some(attempt) = inner.attempt.as_mut().filter(|a| a.id == id) else {
            return;
        };
        if !attempt.popup.is_closed() {
            return;
        }
        let poll = attempt.poll.take();
        if attempt.settled {
            (None, (poll, None))
        } else {
            attempt.settled = true;
            (attempt.reply.take(), (poll, attempt.listener.take()))
        }
    };
    drop(released);
    let Some(reply) = reply else {
        return;
    };

    let err = PopupError::UserCancelled;
    tracing::info!(attempt = id, "popup closed before completion");
    transition(shared, AttemptEvent::Cancel(err.payload()));
    let _ = reply.send(Err(err));
}
