//! Ambient context: fields attached to every record emitted inside a task.
//!
//! # Model
//!
//! Context lives in a tokio task-local, not a thread-local. A worker thread
//! may interleave many requests across `.await` points; each request future
//! carries its own context and sees only its own fields when it resumes.
//!
//! ```text
//! with_context({request_id: "a"}, handler_a)   ─┐
//! with_context({request_id: "b"}, handler_b)   ─┼─ same worker thread,
//!                                               │  interleaved polls,
//! logger.info("x") inside handler_a → "a" only ─┘  no bleed
//! ```
//!
//! Scopes nest. A nested scope starts from a snapshot of its parent and lays
//! its own fields on top, so the innermost value wins. [`bind_context`]
//! writes to the innermost scope only; whatever it wrote disappears when that
//! scope ends, whether it ends by completion, panic or drop.
//!
//! Spawned tasks and threads start empty. Inherit explicitly:
//!
//! ```rust,no_run
//! use tsu_logging::context::ContextExt;
//!
//! # async fn work() {}
//! # async fn demo() {
//! tokio::spawn(work().in_current_context());
//! # }
//! ```

use std::cell::RefCell;
use std::future::Future;

use tokio::task::futures::TaskLocalFuture;

use crate::field::{Fields, IntoFields};

tokio::task_local! {
    static AMBIENT: RefCell<Fields>;
}

/// A future running inside a context scope.
pub type Scoped<F> = TaskLocalFuture<RefCell<Fields>, F>;

/// Runs `future` in a new scope: the caller's context plus `fields`.
///
/// The parent snapshot is taken now, at call time, not when the future is
/// first polled. That makes `tokio::spawn(with_context(.., fut))` inherit
/// from the spawning task.
pub fn with_context<F: Future>(fields: impl IntoFields, future: F) -> Scoped<F> {
    AMBIENT.scope(RefCell::new(inherit(fields)), future)
}

/// Synchronous counterpart of [`with_context`], for closures and plain threads.
pub fn with_context_sync<R>(fields: impl IntoFields, f: impl FnOnce() -> R) -> R {
    AMBIENT.sync_scope(RefCell::new(inherit(fields)), f)
}

/// Adds fields to the innermost active scope.
///
/// Returns `false`, binding nothing, when called outside any scope.
pub fn bind_context(fields: impl IntoFields) -> bool {
    let fields = fields.into_fields();
    AMBIENT.try_with(|ctx| ctx.borrow_mut().extend(fields)).is_ok()
}

/// Removes keys from the innermost active scope.
pub fn unbind_context(keys: &[&str]) {
    let _ = AMBIENT.try_with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        for key in keys {
            ctx.remove(*key);
        }
    });
}

/// Empties the innermost active scope.
pub fn clear_context() {
    let _ = AMBIENT.try_with(|ctx| ctx.borrow_mut().clear());
}

/// A snapshot of the current context. Empty outside any scope.
pub fn current_context() -> Fields {
    AMBIENT.try_with(|ctx| ctx.borrow().clone()).unwrap_or_default()
}

fn inherit(fields: impl IntoFields) -> Fields {
    let mut merged = current_context();
    merged.extend(fields.into_fields());
    merged
}

/// Context helpers on any future.
pub trait ContextExt: Future + Sized {
    /// Carries a snapshot of the current context into this future.
    fn in_current_context(self) -> Scoped<Self> {
        with_context((), self)
    }

    /// Runs this future with additional fields.
    fn with_fields(self, fields: impl IntoFields) -> Scoped<Self> {
        with_context(fields, self)
    }
}

impl<F: Future> ContextExt for F {}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::thread;

    use serde_json::json;

    use super::*;
    use crate::fields;

    #[test]
    fn empty_outside_any_scope() {
        assert!(current_context().is_empty());
        assert!(!bind_context(fields! { "lost" => 1 }));
        assert!(current_context().is_empty());
    }

    #[test]
    fn nested_scopes_innermost_wins() {
        with_context_sync(fields! { "a" => 1, "shared" => "outer" }, || {
            with_context_sync(fields! { "shared" => "inner" }, || {
                let ctx = current_context();
                assert_eq!(ctx["a"], json!(1));
                assert_eq!(ctx["shared"], json!("inner"));
            });
            assert_eq!(current_context()["shared"], json!("outer"));
        });
        assert!(current_context().is_empty());
    }

    #[test]
    fn bind_is_scoped_to_innermost() {
        with_context_sync(fields! { "a" => 1 }, || {
            with_context_sync((), || {
                assert!(bind_context(fields! { "b" => 2 }));
                assert_eq!(current_context()["b"], json!(2));
            });
            assert!(current_context().get("b").is_none());
        });
    }

    #[test]
    fn unbind_and_clear() {
        with_context_sync(fields! { "a" => 1, "b" => 2 }, || {
            unbind_context(&["a"]);
            assert_eq!(current_context().len(), 1);
            clear_context();
            assert!(current_context().is_empty());
        });
    }

    #[test]
    fn snapshot_is_a_copy() {
        with_context_sync(fields! { "a" => 1 }, || {
            let mut snapshot = current_context();
            snapshot.insert("a".to_owned(), json!(99));
            assert_eq!(current_context()["a"], json!(1));
        });
    }

    #[test]
    fn scope_is_removed_after_panic() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            with_context_sync(fields! { "doomed" => true }, || panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(current_context().is_empty());
    }

    #[test]
    fn threads_do_not_inherit_implicitly() {
        with_context_sync(fields! { "parent" => 1 }, || {
            let inherited = current_context();
            let (bare, explicit) = thread::spawn(move || {
                let bare = current_context();
                let explicit = with_context_sync(inherited, current_context);
                (bare, explicit)
            })
            .join()
            .unwrap();
            assert!(bare.is_empty());
            assert_eq!(explicit["parent"], json!(1));
        });
    }

    #[tokio::test]
    async fn context_survives_await_points() {
        with_context(fields! { "request_id" => "r-1" }, async {
            tokio::task::yield_now().await;
            assert_eq!(current_context()["request_id"], json!("r-1"));
            bind_context(fields! { "user" => "bob" });
            tokio::task::yield_now().await;
            assert_eq!(current_context()["user"], json!("bob"));
        })
        .await;
        assert!(current_context().is_empty());
    }

    #[tokio::test]
    async fn spawned_tasks_inherit_only_on_request() {
        with_context(fields! { "parent" => 1 }, async {
            let bare = tokio::spawn(async { current_context() }).await.unwrap();
            let inherited = tokio::spawn(async { current_context() }.in_current_context())
                .await
                .unwrap();
            assert!(bare.is_empty());
            assert_eq!(inherited["parent"], json!(1));
        })
        .await;
    }

    #[tokio::test]
    async fn interleaved_tasks_stay_isolated() {
        let tasks = (0..32).map(|i| {
            with_context(fields! { "task" => i }, async move {
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                    assert_eq!(current_context()["task"], json!(i));
                }
                bind_context(fields! { "done" => i });
                tokio::task::yield_now().await;
                current_context()
            })
        });

        // join_all polls every future on this one task, interleaving them.
        let results = futures_util::future::join_all(tasks).await;
        for (i, ctx) in results.into_iter().enumerate() {
            assert_eq!(ctx["task"], json!(i));
            assert_eq!(ctx["done"], json!(i));
        }
    }
}
