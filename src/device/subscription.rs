use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a callback registered with a device adapter.
///
/// The callback stops being invoked once the handle is unsubscribed or dropped. Adapters that forward
/// events from a background task hand that task over as well; the task is expected to stop when the
/// token is cancelled.
#[derive(Debug)]
pub struct Subscription {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(cancel: CancellationToken) -> Self {
        Subscription { cancel, task: None }
    }

    pub fn with_task(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Subscription { cancel, task: Some(task) }
    }

    /// Cancels the callback and waits for the forwarding task (if any) to finish.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::warn!("Subscription task did not stop cleanly: {}", err);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_cancels_token() {
        let token = CancellationToken::new();
        let subscription = Subscription::new(token.clone());
        assert!(!token.is_cancelled());

        drop(subscription);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn unsubscribe_joins_task() {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = tokio::spawn(async move { task_token.cancelled().await });

        Subscription::with_task(token.clone(), task).unsubscribe().await;
        assert!(token.is_cancelled());
    }
}
