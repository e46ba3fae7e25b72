//! Reporting of errors nobody observed.
//!
//! When a shared result holding an error is destroyed before any consumer
//! read it, the loss is reported through a process-wide hook. The default
//! hook logs a warning through `tracing`.

use crate::error::Error;

use std::sync::RwLock;

/// Signature of the unobserved-error hook.
pub type UnobservedErrorHook = fn(&Error);

static HOOK: RwLock<Option<UnobservedErrorHook>> = RwLock::new(None);

/// Installs a hook invoked for every error dropped without being consumed.
///
/// Cancellations are not reported.
///
/// Returns the previously installed hook, if any.
pub fn set_unobserved_error_hook(hook: UnobservedErrorHook) -> Option<UnobservedErrorHook> {
    let mut slot = HOOK.write().unwrap_or_else(|e| e.into_inner());
    slot.replace(hook)
}

/// Restores the default logging behaviour.
pub fn clear_unobserved_error_hook() {
    let mut slot = HOOK.write().unwrap_or_else(|e| e.into_inner());
    *slot = None;
}

pub(crate) fn report_unobserved(error: &Error) {
    if error.is_canceled() {
        tracing::trace!("dropped result holding a cancellation");
        return;
    }

    let hook = *HOOK.read().unwrap_or_else(|e| e.into_inner());

    match hook {
        Some(hook) => hook(error),
        None => tracing::warn!(%error, "result dropped with an unobserved error"),
    }
}
