//! Optimistic mutations.
//!
//! A mutation edits local state right away, then either keeps (and possibly
//! corrects) that edit once the server answers, or undoes it. Mutations on
//! the same key run one after another: the second waits for the first to
//! settle before applying its own edit. Different keys never wait on each
//! other.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::error::ApiError;

pub struct Reconciler<K> {
    pending: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for Reconciler<K> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

/// A turn on one key. Removes the key's entry once nobody holds or waits on it.
struct Slot<'a, K: Eq + Hash> {
    owner: &'a Reconciler<K>,
    key: K,
    lock: Arc<AsyncMutex<()>>,
}

impl<K: Eq + Hash> Drop for Slot<'_, K> {
    fn drop(&mut self) {
        let mut pending = self.owner.map();
        // One reference in the map, one here.
        if pending
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 2)
        {
            pending.remove(&self.key);
        }
    }
}

impl<K: Eq + Hash> Reconciler<K> {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<K, Arc<AsyncMutex<()>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Eq + Hash + Clone> Reconciler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a mutation on `key` is running or waiting.
    pub fn is_pending(&self, key: &K) -> bool {
        self.map().contains_key(key)
    }

    /// Runs one optimistic mutation against `state`.
    ///
    /// `apply` edits the state and returns whatever `revert` needs to put it
    /// back; an error from `apply` cancels the mutation before any call is
    /// made. `call` builds the request from that same value. `commit` sees
    /// the server's answer and may correct the state. The state lock is never
    /// held across the network call.
    pub async fn run<S, U, T, Fut>(
        &self,
        key: K,
        state: &Mutex<S>,
        apply: impl FnOnce(&mut S) -> Result<U, ApiError>,
        call: impl FnOnce(&U) -> Fut,
        commit: impl FnOnce(&mut S, &T),
        revert: impl FnOnce(&mut S, U),
    ) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let lock = self.map().entry(key.clone()).or_default().clone();
        let slot = Slot {
            owner: self,
            key,
            lock,
        };
        let _turn = slot.lock.lock().await;

        let undo = {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            apply(&mut *state)?
        };

        let result = call(&undo).await;

        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(value) => commit(&mut *state, value),
            Err(err) => {
                tracing::debug!(error = %err, "reverting optimistic update");
                revert(&mut *state, undo);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn commit_keeps_and_corrects() {
        let reconciler = Reconciler::new();
        let state = Mutex::new(10);

        let out = reconciler
            .run(
                1,
                &state,
                |n| {
                    *n += 1;
                    Ok(*n - 1)
                },
                |_| async { Ok::<_, ApiError>(42) },
                |n, server| *n = *server,
                |n, before| *n = before,
            )
            .await;

        assert_eq!(out, Ok(42));
        assert_eq!(*state.lock().unwrap(), 42);
        assert!(!reconciler.is_pending(&1));
    }

    #[tokio::test]
    async fn failure_reverts() {
        let reconciler = Reconciler::new();
        let state = Mutex::new(vec![1, 2, 3]);

        let out = reconciler
            .run(
                "k",
                &state,
                |v| Ok(std::mem::replace(v, vec![])),
                |_| async { Err::<(), _>(ApiError::Transport("down".into())) },
                |_, _| {},
                |v, before| *v = before,
            )
            .await;

        assert!(out.is_err());
        assert_eq!(*state.lock().unwrap(), vec![1, 2, 3]);
        assert!(!reconciler.is_pending(&"k"));
    }

    #[tokio::test]
    async fn rejected_apply_skips_the_call() {
        let reconciler = Reconciler::new();
        let state = Mutex::new(0);
        let called = std::cell::Cell::new(false);

        let out = reconciler
            .run(
                1,
                &state,
                |_| Err::<(), _>(ApiError::AlreadyVoted),
                |_| {
                    called.set(true);
                    async { Ok::<_, ApiError>(()) }
                },
                |_, _| {},
                |_, _| {},
            )
            .await;

        assert_eq!(out, Err(ApiError::AlreadyVoted));
        assert!(!called.get());
        assert!(!reconciler.is_pending(&1));
    }

    #[tokio::test]
    async fn same_key_waits_for_the_first_to_settle() {
        let reconciler = Arc::new(Reconciler::new());
        let state = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = {
            let (reconciler, state) = (reconciler.clone(), state.clone());
            tokio::spawn(async move {
                reconciler
                    .run(
                        7,
                        &*state,
                        |log| {
                            log.push("apply 1");
                            Ok(())
                        },
                        |_| async move {
                            let _ = release_rx.await;
                            Ok::<_, ApiError>(())
                        },
                        |log, _| log.push("commit 1"),
                        |_, _| {},
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(reconciler.is_pending(&7));

        let second = {
            let (reconciler, state) = (reconciler.clone(), state.clone());
            tokio::spawn(async move {
                reconciler
                    .run(
                        7,
                        &*state,
                        |log| {
                            log.push("apply 2");
                            Ok(())
                        },
                        |_| async { Ok::<_, ApiError>(()) },
                        |log, _| log.push("commit 2"),
                        |_, _| {},
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*state.lock().unwrap(), vec!["apply 1"]);

        release_tx.send(()).unwrap();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(
            *state.lock().unwrap(),
            vec!["apply 1", "commit 1", "apply 2", "commit 2"]
        );
        assert!(!reconciler.is_pending(&7));
    }

    #[tokio::test]
    async fn different_keys_do_not_wait() {
        let reconciler = Arc::new(Reconciler::new());
        let state = Arc::new(Mutex::new(0));
        let (_hold_tx, hold_rx) = oneshot::channel::<()>();

        let blocked = {
            let (reconciler, state) = (reconciler.clone(), state.clone());
            tokio::spawn(async move {
                reconciler
                    .run(
                        1,
                        &*state,
                        |_| Ok(()),
                        |_| async move {
                            let _ = hold_rx.await;
                            Ok::<_, ApiError>(())
                        },
                        |_, _| {},
                        |_, _| {},
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let out = reconciler
            .run(
                2,
                &*state,
                |n| {
                    *n += 1;
                    Ok(())
                },
                |_| async { Ok::<_, ApiError>(()) },
                |_, _| {},
                |_, _| {},
            )
            .await;
        assert!(out.is_ok());
        assert_eq!(*state.lock().unwrap(), 1);
        blocked.abort();
    }
}
