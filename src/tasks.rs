//! Detached task spawning on the ambient tokio runtime

use std::future::Future;

use log::error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Spawn `future` on the current runtime. Outside a runtime the work is
/// dropped with an error log instead of panicking.
pub(crate) fn spawn<F>(label: &str, future: F) -> Option<JoinHandle<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(_) => {
            error!("No async runtime available; dropping {}", label);
            None
        }
    }
}
