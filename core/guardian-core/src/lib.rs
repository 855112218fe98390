//! # guardian-core
//!
//! Core library for the focus guardian: keeps a user inside an allow-list of
//! sites for the duration of a declared flow session.
//!
//! ## Components
//!
//! - [`matcher`]: pure allow-list policy (hostname × allow-list → allowed?)
//! - [`store`]: the Session Store, owner of the single session record
//! - [`observer`]: tab navigation/activation handlers that record distractions
//!   and ask for an overlay
//! - [`overlay`]: the in-page blocking prompt with its snooze timer
//! - [`bridge`]: same-origin page messages ↔ session control
//! - [`status`]: popup-style summary of the current session
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The daemon serializes
//!   access with a `Mutex`; every context is single-threaded otherwise.
//! - **Capabilities as traits**: persistence, badge, overlay injection, page
//!   surfaces and relays are traits so each host environment plugs in its own.
//! - **Best effort**: persistence, badge and injection failures are logged
//!   and absorbed; nothing propagates to the host page.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use guardian_core::{FileSessionPersistence, FileStatusIndicator, SessionStore, StorageConfig};
//!
//! let storage = StorageConfig::resolve()?;
//! let mut store = SessionStore::new(
//!     FileSessionPersistence::new(storage.session_file()),
//!     FileStatusIndicator::new(storage.badge_file()),
//! );
//! store.restore();
//! store.start("task-1", &["github.com".to_string()]);
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod indicator;
pub mod matcher;
pub mod observer;
pub mod overlay;
pub mod persistence;
pub mod status;
pub mod storage;
pub mod store;

pub use bridge::{BridgeOutcome, MessagingBridge, PageApi, PageEvent, PagePort, RelayError, SessionRelay};
pub use config::{load_config, save_config, GuardianConfig, DEFAULT_ALLOWED_SITES};
pub use error::{GuardianError, Result};
pub use indicator::{Badge, FileStatusIndicator, MemoryStatusIndicator, StatusIndicator};
pub use matcher::{extract_hostname, is_allowed, is_url_allowed, AllowList};
pub use observer::{on_tab_activated, on_tab_updated, InjectionError, OverlayInjector, OverlayRequest, Verdict};
pub use overlay::{
    MemorySurface, OverlayChoice, OverlayController, OverlayState, OverlayView, Surface,
    OVERLAY_ELEMENT_ID, SNOOZE_DURATION,
};
pub use persistence::{FileSessionPersistence, MemorySessionPersistence, SessionPersistence};
pub use status::{format_duration, StatusSummary};
pub use storage::StorageConfig;
pub use store::{EndedSession, SessionStore};

pub use focus_guardian_protocol::{Distraction, Session, SessionStatus};
