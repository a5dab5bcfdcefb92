//! Concurrent execution of every registered realm.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use realmlink_realm::{EventEmitter, Realm, RealmError};
use realmlink_types::{AsyncError, Event};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A realm's run loop panicked.
#[derive(Debug, thiserror::Error)]
#[error("realm run panicked: {0}")]
pub struct RealmPanic(pub String);

enum Outcome {
    Finished(Result<(), RealmError>),
    Panicked(RealmPanic),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Label under which a realm's run failure is reported.
pub fn run_label(key: &str) -> String {
    format!("Run[realm:{key}]")
}

/// Runs every realm on its own task and waits for all of them.
///
/// A realm that fails (other than by cancellation) or panics produces one
/// [`Event::AsyncError`] on `emitter`; its siblings keep running. Shutdown is
/// driven by cancelling `cancel`, never from here.
pub async fn run_all(
    realms: Vec<(String, Arc<dyn Realm>)>,
    emitter: &EventEmitter,
    cancel: &CancellationToken,
) {
    let mut tasks = JoinSet::new();

    for (key, realm) in realms {
        let cancel = cancel.clone();
        tasks.spawn(async move {
            tracing::debug!(realm = %key, "starting realm");
            let outcome = match AssertUnwindSafe(realm.run(cancel)).catch_unwind().await {
                Ok(result) => Outcome::Finished(result),
                Err(payload) => Outcome::Panicked(RealmPanic(panic_message(payload))),
            };
            (key, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (key, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                // Panics are caught inside the task; only an abort lands here.
                tracing::error!("realm task join error: {}", e);
                continue;
            }
        };

        match outcome {
            Outcome::Finished(Ok(())) => {
                tracing::info!(realm = %key, "realm finished");
            }
            Outcome::Finished(Err(e)) if e.is_cancelled() => {
                tracing::info!(realm = %key, "realm cancelled");
            }
            Outcome::Finished(Err(e)) => {
                tracing::warn!(realm = %key, error = %e, "realm failed");
                emitter.fire(&Event::AsyncError(AsyncError::new(run_label(&key), e)));
            }
            Outcome::Panicked(p) => {
                tracing::error!(realm = %key, error = %p, "realm panicked");
                emitter.fire(&Event::AsyncError(AsyncError::new(run_label(&key), p)));
            }
        }
    }
}
