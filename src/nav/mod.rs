pub mod gate;

pub use gate::{MESSAGE_CLASS, NavigationBlockSession, NavigationGate, SURROGATE_CLASS, SessionInfo};
