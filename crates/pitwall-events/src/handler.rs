//! Callback handles.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

/// A shareable callback receiving a payload of type `P`.
///
/// Two handles are equal when they share the same allocation, so keep a clone
/// of the handle you subscribed to be able to unsubscribe it later.
pub struct Handler<P> {
    callback: Arc<dyn Fn(&P) + Send + Sync>,
}

impl<P> Handler<P> {
    /// Wrap a closure.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Invoke the callback.
    pub fn call(&self, payload: &P) {
        (self.callback)(payload);
    }
}

impl<P> Clone for Handler<P> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<P> PartialEq for Handler<P> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<P> Eq for Handler<P> {}

impl<P> fmt::Debug for Handler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("ptr", &Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// Invoke every handler in order, isolating panics.
///
/// Returns the number of handlers that panicked.
pub fn invoke_all<P>(topic: &str, handlers: &[Handler<P>], payload: &P) -> usize {
    let mut panicked = 0;
    for handler in handlers {
        if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| handler.call(payload))) {
            panicked += 1;
            error!(
                topic,
                reason = panic_message(&*cause),
                "event handler panicked"
            );
        }
    }
    panicked
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
