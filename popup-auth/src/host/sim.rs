//! Deterministic in-memory host.
//!
//! Time only moves when [`SimHost::advance`] is called and messages are
//! delivered synchronously by [`SimHost::post_message`], which makes callback
//! ordering fully scriptable.

use super::{MessageHandler, Popup, PopupHost, PopupWindow, Subscription, TickHandler};
use crate::message::InboundMessage;
use crate::popup::{ScreenMetrics, Viewport};
use serde::Serialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A popup window that exists only in memory.
#[derive(Debug)]
pub struct SimPopup {
    url: String,
    closed: Cell<bool>,
    focus_count: Cell<u32>,
}

impl SimPopup {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn close(&self) {
        self.closed.set(true);
    }

    pub fn focus_count(&self) -> u32 {
        self.focus_count.get()
    }
}

impl PopupWindow for SimPopup {
    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn focus(&self) {
        self.focus_count.set(self.focus_count.get() + 1);
    }
}

/// One `window.open` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenRecord {
    pub url: String,
    pub target: String,
    pub features: String,
    /// False when the call was blocked.
    pub opened: bool,
}

struct Timer {
    period: Duration,
    next_due: Duration,
    // `None` while the handler is running.
    handler: Option<TickHandler>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, Option<MessageHandler>>,
    timers: BTreeMap<u64, Timer>,
}

impl Registry {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

pub struct SimHost {
    viewport: RefCell<Viewport>,
    block_popups: Cell<bool>,
    now: Cell<Duration>,
    opened: RefCell<Vec<OpenRecord>>,
    popups: RefCell<Vec<Rc<SimPopup>>>,
    registry: Rc<RefCell<Registry>>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// A desktop browser with default screen metrics.
    pub fn new() -> Self {
        Self {
            viewport: RefCell::new(Viewport {
                user_agent: DESKTOP_USER_AGENT.to_string(),
                metrics: ScreenMetrics::default(),
            }),
            block_popups: Cell::new(false),
            now: Cell::new(Duration::ZERO),
            opened: RefCell::new(Vec::new()),
            popups: RefCell::new(Vec::new()),
            registry: Rc::new(RefCell::new(Registry::default())),
        }
    }

    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        self.viewport.borrow_mut().user_agent = user_agent.into();
    }

    pub fn set_metrics(&self, metrics: ScreenMetrics) {
        self.viewport.borrow_mut().metrics = metrics;
    }

    /// Make subsequent `window.open` calls fail, like a popup blocker.
    pub fn set_block_popups(&self, blocked: bool) {
        self.block_popups.set(blocked);
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn opened(&self) -> Vec<OpenRecord> {
        self.opened.borrow().clone()
    }

    pub fn last_popup(&self) -> Option<Rc<SimPopup>> {
        self.popups.borrow().last().cloned()
    }

    /// Close the most recently opened popup, as the user would.
    pub fn close_popup(&self) {
        if let Some(popup) = self.last_popup() {
            popup.close();
        }
    }

    pub fn live_listeners(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    pub fn live_timers(&self) -> usize {
        self.registry.borrow().timers.len()
    }

    /// Deliver a message to every listener registered at the time of the call.
    pub fn post_message(&self, origin: &str, data: Value) {
        let ids: Vec<u64> = self.registry.borrow().listeners.keys().copied().collect();
        for id in ids {
            let handler = {
                let mut registry = self.registry.borrow_mut();
                registry.listeners.get_mut(&id).and_then(Option::take)
            };
            let Some(mut handler) = handler else {
                continue;
            };
            handler(InboundMessage::new(origin, data.clone()));
            self.rearm_listener(id, handler);
        }
    }

    /// Move the clock forward, firing due timers in (due time, registration) order.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        while let Some((id, due)) = self.next_due_timer(target) {
            self.now.set(due);
            let handler = {
                let mut registry = self.registry.borrow_mut();
                registry.timers.get_mut(&id).and_then(|timer| {
                    timer.next_due = due + timer.period;
                    timer.handler.take()
                })
            };
            let Some(mut handler) = handler else {
                continue;
            };
            handler();
            self.rearm_timer(id, handler);
        }
        self.now.set(target);
    }

    fn next_due_timer(&self, limit: Duration) -> Option<(u64, Duration)> {
        self.registry
            .borrow()
            .timers
            .iter()
            .filter(|(_, timer)| timer.handler.is_some() && timer.next_due <= limit)
            .map(|(id, timer)| (*id, timer.next_due))
            .min_by_key(|(id, due)| (*due, *id))
    }

    // A handler released while it was running stays released.
    fn rearm_listener(&self, id: u64, handler: MessageHandler) {
        let released = {
            let mut registry = self.registry.borrow_mut();
            match registry.listeners.get_mut(&id) {
                Some(slot) => {
                    *slot = Some(handler);
                    None
                }
                None => Some(handler),
            }
        };
        drop(released);
    }

    fn rearm_timer(&self, id: u64, handler: TickHandler) {
        let released = {
            let mut registry = self.registry.borrow_mut();
            match registry.timers.get_mut(&id) {
                Some(timer) => {
                    timer.handler = Some(handler);
                    None
                }
                None => Some(handler),
            }
        };
        drop(released);
    }
}

fn release(
    registry: Weak<RefCell<Registry>>,
    remove: impl FnOnce(&mut Registry) + 'static,
) -> Subscription {
    Subscription::new(move || {
        if let Some(registry) = registry.upgrade() {
            remove(&mut registry.borrow_mut());
        }
    })
}

impl PopupHost for SimHost {
    fn viewport(&self) -> Viewport {
        self.viewport.borrow().clone()
    }

    fn open_window(&self, url: &str, target: &str, features: &str) -> Option<Popup> {
        let blocked = self.block_popups.get();
        self.opened.borrow_mut().push(OpenRecord {
            url: url.to_string(),
            target: target.to_string(),
            features: features.to_string(),
            opened: !blocked,
        });
        if blocked {
            return None;
        }
        let popup = Rc::new(SimPopup {
            url: url.to_string(),
            closed: Cell::new(false),
            focus_count: Cell::new(0),
        });
        self.popups.borrow_mut().push(Rc::clone(&popup));
        Some(popup)
    }

    fn listen_messages(&self, handler: MessageHandler) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.allocate();
            registry.listeners.insert(id, Some(handler));
            id
        };
        release(Rc::downgrade(&self.registry), move |r| {
            r.listeners.remove(&id);
        })
    }

    fn set_interval(&self, period: Duration, tick: TickHandler) -> Subscription {
        let period = period.max(MIN_PERIOD);
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.allocate();
            registry.timers.insert(
                id,
                Timer {
                    period,
                    next_due: self.now.get() + period,
                    handler: Some(tick),
                },
            );
            id
        };
        release(Rc::downgrade(&self.registry), move |r| {
            r.timers.remove(&id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interval_fires_once_per_period() {
        let host = SimHost::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = host.set_interval(
            Duration::from_millis(100),
            Box::new(move || c.set(c.get() + 1)),
        );

        host.advance(Duration::from_millis(99));
        assert_eq!(count.get(), 0);
        host.advance(Duration::from_millis(1));
        assert_eq!(count.get(), 1);
        host.advance(Duration::from_millis(350));
        assert_eq!(count.get(), 4);
        assert_eq!(host.now(), Duration::from_millis(450));
    }

    #[test]
    fn dropped_subscriptions_stop_firing() {
        let host = SimHost::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let sub = host.listen_messages(Box::new(move |_| c.set(c.get() + 1)));
        host.post_message("https://a.example", json!(1));
        drop(sub);
        host.post_message("https://a.example", json!(2));
        assert_eq!(count.get(), 1);
        assert_eq!(host.live_listeners(), 0);
    }

    #[test]
    fn handler_can_release_itself() {
        let host = Rc::new(SimHost::new());
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));

        let s = Rc::clone(&slot);
        let c = Rc::clone(&count);
        let sub = host.set_interval(
            Duration::from_millis(10),
            Box::new(move || {
                c.set(c.get() + 1);
                s.borrow_mut().take();
            }),
        );
        *slot.borrow_mut() = Some(sub);

        host.advance(Duration::from_millis(100));
        assert_eq!(count.get(), 1);
        assert_eq!(host.live_timers(), 0);
    }

    #[test]
    fn blocked_open_is_recorded() {
        let host = SimHost::new();
        host.set_block_popups(true);
        assert!(host.open_window("https://p.example", "Auth", "scrollbars=1").is_none());
        let opened = host.opened();
        assert_eq!(opened.len(), 1);
        assert!(!opened[0].opened);
        assert!(host.last_popup().is_none());
    }
}
