//! Panic guard.
//!
//! Wraps a unit of work, stops a panic at that boundary and turns it into a
//! single `error` record. The stack is captured at the panic site by a
//! process-wide panic hook, installed on first use, which only acts on
//! threads currently inside a guard. Elsewhere the previous hook runs as
//! before.
//!
//! Has no effect when the binary is built with `panic = "abort"`.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use serde_json::Value;

use crate::observability::logger::Logger;
use crate::observability::report::ErrorReport;
use crate::observability::stacktrace::Stacktrace;

/// Field carrying the panic-site stack.
pub const STACK_KEY: &str = "stack";

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static CAPTURE_HOOK: Once = Once::new();

fn install_capture_hook() {
    CAPTURE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) > 0 {
                let stack = Backtrace::force_capture().to_string();
                PANIC_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            } else {
                previous(info);
            }
        }));
    });
}

struct GuardScope;

impl GuardScope {
    fn enter() -> Self {
        install_capture_hook();
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        GuardScope
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `work`, logging a panic through `logger` instead of propagating it.
///
/// Returns `None` if `work` panicked.
pub fn recover<T, F>(logger: &dyn Logger, work: F) -> Option<T>
where
    F: FnOnce() -> T,
{
    let outcome = {
        let _scope = GuardScope::enter();
        panic::catch_unwind(AssertUnwindSafe(work))
    };

    match outcome {
        Ok(value) => Some(value),
        Err(payload) => {
            report_panic(logger, payload.as_ref());
            None
        }
    }
}

/// Async counterpart of [`recover`]. The guard is active during every poll
/// of `future`, whichever thread polls it.
pub async fn recover_async<F>(logger: &dyn Logger, future: F) -> Option<F::Output>
where
    F: Future,
{
    let guarded = Guarded {
        inner: Box::pin(future),
    };

    match AssertUnwindSafe(guarded).catch_unwind().await {
        Ok(value) => Some(value),
        Err(payload) => {
            report_panic(logger, payload.as_ref());
            None
        }
    }
}

struct Guarded<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Guarded<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _scope = GuardScope::enter();
        self.inner.as_mut().poll(cx)
    }
}

fn report_panic(logger: &dyn Logger, payload: &(dyn Any + Send)) {
    let message = panic_message(payload);
    let stack = PANIC_STACK
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string());
    let report = ErrorReport::new("panic", message.clone()).with_stacktrace(Stacktrace::parse(&stack));

    logger
        .with_field(STACK_KEY, Value::String(stack))
        .with_error_report(report)
        .error(&message);
}

/// Render a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::severity::Severity;
    use crate::observability::test_logger::TestLogger;

    #[test]
    fn test_no_panic_is_a_no_op() {
        let logger = TestLogger::new();
        let value = recover(&logger, || 40 + 2);
        assert_eq!(value, Some(42));
        assert!(logger.entries().is_empty());
    }

    #[test]
    fn test_panic_becomes_error_record() {
        let logger = TestLogger::new();
        let value: Option<()> = recover(&logger, || panic!("ledger out of balance"));

        assert!(value.is_none());
        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Severity::Error);
        assert_eq!(entries[0].message, "ledger out of balance");
        let stack = entries[0].fields.get(STACK_KEY).and_then(Value::as_str).unwrap();
        assert!(!stack.is_empty());
        assert_eq!(
            entries[0].fields.get("error").and_then(Value::as_str),
            Some("ledger out of balance")
        );
    }

    #[test]
    fn test_formatted_payload() {
        let logger = TestLogger::new();
        let id = 17;
        let _: Option<()> = recover(&logger, || panic!("invoice {id} missing"));
        assert_eq!(logger.last_entry().unwrap().message, "invoice 17 missing");
    }

    #[test]
    fn test_non_string_payload() {
        let logger = TestLogger::new();
        let _: Option<()> = recover(&logger, || std::panic::panic_any(404_u16));
        assert_eq!(logger.last_entry().unwrap().message, "unknown panic");
    }

    #[test]
    fn test_guard_depth_is_restored() {
        let logger = TestLogger::new();
        let outer = recover(&logger, || {
            let inner: Option<()> = recover(&logger, || panic!("inner"));
            inner.is_none()
        });
        assert_eq!(outer, Some(true));
        assert_eq!(GUARD_DEPTH.with(Cell::get), 0);
        assert_eq!(logger.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_recover_async() {
        let logger = TestLogger::new();

        let ok = recover_async(&logger, async { "done" }).await;
        assert_eq!(ok, Some("done"));

        let failed: Option<()> = recover_async(&logger, async {
            tokio::task::yield_now().await;
            panic!("handler exploded");
        })
        .await;

        assert!(failed.is_none());
        assert_eq!(logger.last_entry().unwrap().message, "handler exploded");
        assert_eq!(GUARD_DEPTH.with(Cell::get), 0);
    }
}
