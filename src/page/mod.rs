//! Page lifecycle: shared context and DOM readiness

pub mod context;
pub mod readiness;

pub use context::PageContext;
pub use readiness::DomReadiness;
