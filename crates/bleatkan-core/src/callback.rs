//! Listener invocation.
//!
//! Consumer callbacks run on the library's own tasks. A panicking listener is
//! logged and the calling loop carries on.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Run a listener callback, catching and logging any panic.
///
/// Returns `false` if the callback panicked.
pub(crate) fn invoke<F: FnOnce()>(context: &str, callback: F) -> bool {
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(()) => true,
        Err(panic) => {
            error!("{}: listener panicked: {}", context, panic_message(panic.as_ref()));
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
