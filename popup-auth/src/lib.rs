pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod message;
pub mod popup;
pub mod state;

// Re-exports for convenience
pub use config::PopupConfig;
pub use controller::{AuthFuture, AuthPopup, StartOptions};
pub use error::PopupError;
pub use host::sim::SimHost;
#[cfg(target_arch = "wasm32")]
pub use host::web::BrowserHost;
pub use host::{Popup, PopupHost, PopupWindow, Subscription};
pub use message::{Discard, InboundMessage, MessageFilter};
pub use popup::{ScreenMetrics, Viewport, WindowFeatures, WindowSize, open_popup};
pub use state::{AttemptEvent, AttemptState, Phase, reduce};
