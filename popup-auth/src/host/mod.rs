pub mod sim;
#[cfg(target_arch = "wasm32")]
pub mod web;

use crate::message::InboundMessage;
use crate::popup::Viewport;
use std::rc::Rc;
use std::time::Duration;

/// A window opened by the host.
pub trait PopupWindow {
    /// True once the user, the popup's own script or the browser closed it.
    fn is_closed(&self) -> bool;
    /// Bring the window to the foreground.
    fn focus(&self);
}

/// Shared handle to an opened popup.
pub type Popup = Rc<dyn PopupWindow>;

pub type MessageHandler = Box<dyn FnMut(InboundMessage)>;
pub type TickHandler = Box<dyn FnMut()>;

/// The window system the controller runs on.
///
/// Implementations must never invoke a handler synchronously from inside
/// `listen_messages` or `set_interval`; callbacks run later on the same
/// event loop.
pub trait PopupHost {
    /// User agent and screen geometry used to place the popup.
    fn viewport(&self) -> Viewport;

    /// `window.open(url, target, features)`. `None` when creation is blocked.
    fn open_window(&self, url: &str, target: &str, features: &str) -> Option<Popup>;

    /// Subscribe to cross-window messages delivered to the hosting window.
    fn listen_messages(&self, handler: MessageHandler) -> Subscription;

    /// Run `tick` every `period` until the returned subscription is dropped.
    fn set_interval(&self, period: Duration, tick: TickHandler) -> Subscription;
}

/// A live listener or timer registration. Dropping it releases the registration.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A registration with nothing to release.
    pub fn detached() -> Self {
        Self { release: None }
    }

    /// Release now. Equivalent to dropping.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.release.is_some())
            .finish()
    }
}
