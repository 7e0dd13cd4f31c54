use std::sync::{Mutex, PoisonError};
use futures::Stream;
use log::debug;
use tokio::sync::broadcast::{self, error::RecvError};

/// A single-slot replay buffer: new subscribers first receive the most recent value (if any), then every
/// value published afterwards. Slow subscribers skip to the newest value instead of queueing.
pub struct ReplayCell<T: Clone> {
    last: Mutex<Option<T>>,
    sender: broadcast::Sender<T>,
}

impl<T: Clone> ReplayCell<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        ReplayCell { last: Mutex::new(None), sender }
    }

    pub fn publish(&self, value: T) {
        // subscribe() takes the same lock, so a subscriber sees a value either as replay or live, never both
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Some(value.clone());
        // no live receivers is fine
        let _ = self.sender.send(value);
    }

    pub fn latest(&self) -> Option<T> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn subscribe(&self) -> Replay<T> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        Replay {
            pending: last.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

impl<T: Clone> Default for ReplayCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view on a [`ReplayCell`].
pub struct Replay<T: Clone> {
    pending: Option<T>,
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Replay<T> {
    /// Next value, or `None` once the cell has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        if let Some(value) = self.pending.take() {
            return Some(value);
        }

        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Replay subscriber skipped {} stale value(s)", skipped);
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |mut replay| async move {
            replay.recv().await.map(|value| (value, replay))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn nothing_is_replayed_before_first_publish() {
        let cell: ReplayCell<u8> = ReplayCell::new();
        let mut replay = cell.subscribe();

        assert!(timeout(Duration::from_millis(20), replay.recv()).await.is_err());
        assert_eq!(cell.latest(), None);
    }

    #[tokio::test]
    async fn late_subscriber_gets_last_value_only() {
        let cell = ReplayCell::new();
        cell.publish(60u8);
        cell.publish(61u8);

        let mut replay = cell.subscribe();
        assert_eq!(replay.recv().await, Some(61));

        cell.publish(62);
        assert_eq!(replay.recv().await, Some(62));
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest() {
        let cell = ReplayCell::new();
        let mut replay = cell.subscribe();

        cell.publish(1u8);
        cell.publish(2u8);
        cell.publish(3u8);

        assert_eq!(replay.recv().await, Some(3));
    }

    #[tokio::test]
    async fn stream_ends_when_cell_is_dropped() {
        let cell = ReplayCell::new();
        cell.publish(70u8);
        let stream = cell.subscribe().into_stream();
        drop(cell);

        assert_eq!(stream.collect::<Vec<_>>().await, vec![70]);
    }
}
