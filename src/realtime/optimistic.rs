/// Optimistic commit/rollback for client-side state
use crate::error::{ReelError, ReelResult};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::RwLock;

/// A value changed locally before the server confirms the change.
///
/// `update` applies the local change, then awaits the server call under a
/// deadline. Success lets `confirm` fold the server's answer in; failure or
/// timeout runs `revert`, which undoes only that change. Anything folded in
/// by `modify` or another `update` while the call was in flight survives.
#[derive(Debug)]
pub struct OptimisticCell<T> {
    state: Arc<RwLock<T>>,
}

impl<T> Clone for OptimisticCell<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + Sync> OptimisticCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(value)),
        }
    }

    pub async fn get(&self) -> T {
        self.state.read().await.clone()
    }

    /// Overwrite with server-confirmed state
    pub async fn set(&self, value: T) {
        *self.state.write().await = value;
    }

    /// Mutate in place with server-confirmed data
    pub async fn modify(&self, change: impl FnOnce(&mut T)) {
        change(&mut *self.state.write().await);
    }

    pub async fn update<R, Fut>(
        &self,
        apply: impl FnOnce(&mut T),
        call: Fut,
        confirm: impl FnOnce(&mut T, &R),
        revert: impl FnOnce(&mut T),
        deadline: Duration,
    ) -> ReelResult<R>
    where
        Fut: Future<Output = ReelResult<R>>,
    {
        apply(&mut *self.state.write().await);

        let result = match tokio::time::timeout(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(ReelError::Timeout(format!(
                "No confirmation within {:?}",
                deadline
            ))),
        };

        let mut state = self.state.write().await;
        match result {
            Ok(value) => {
                confirm(&mut *state, &value);
                Ok(value)
            }
            Err(e) => {
                tracing::debug!("Rolling back optimistic change: {}", e);
                revert(&mut *state);
                Err(e)
            }
        }
    }
}
