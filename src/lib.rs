//! Host-resilient state sync and navigation gating for embedded survey pages
//!
//! The host survey engine replaces its page on every step while this code's
//! state lives on. [`PageRuntime`] ties together the pieces:
//!
//! - [`page::DomReadiness`] waits for the host to render the navigation controls
//! - [`store::StateStore`] reads and writes named values, mirroring writes to
//!   the platform through [`sync`]
//! - [`nav::NavigationGate`] temporarily swaps the next control for a surrogate

pub mod config;
pub mod error;
pub mod host;
pub mod nav;
pub mod page;
pub mod runtime;
pub mod store;
pub mod stratify;
pub mod sync;
mod tasks;

pub use config::{Config, UrlScheme};
pub use error::{StratifyError, SurveyError, SyncTransportFailure};
pub use host::{Document, MemoryDocument, NavDirection, NodeId, SurveyEngine};
pub use nav::NavigationGate;
pub use page::{DomReadiness, PageContext};
pub use runtime::PageRuntime;
pub use store::StateStore;
