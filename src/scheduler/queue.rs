use super::strategy::WorkItem;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("work queue closed")]
    Closed,

    #[error("work queue error: {0}")]
    Generic(String),
}

/// Hand-off point between the scheduler and downstream fetch workers.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue_batch(&self, items: Vec<WorkItem>) -> Result<(), QueueError>;
}

pub type Sender = mpsc::Sender<Vec<WorkItem>>;
pub type Receiver = mpsc::Receiver<Vec<WorkItem>>;

/// In-process queue over a bounded channel of batches. Each batch is one
/// message, so a batch is either queued whole or not at all. A full channel
/// applies backpressure to the scheduler.
#[derive(Debug, Clone)]
pub struct ChannelWorkQueue {
    tx: Sender,
}

impl ChannelWorkQueue {
    pub fn new(buffer_size: usize) -> (Self, Receiver) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl WorkQueue for ChannelWorkQueue {
    async fn enqueue_batch(&self, items: Vec<WorkItem>) -> Result<(), QueueError> {
        self.tx.send(items).await.map_err(|_| QueueError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_batch_arrives_whole_and_in_order() {
        let (queue, mut rx) = ChannelWorkQueue::new(8);
        let items = vec![
            WorkItem::new("a", "windowed", json!(1)),
            WorkItem::new("a", "windowed", json!(2)),
        ];
        queue.enqueue_batch(items.clone()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), items);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_batch_larger_than_capacity_takes_one_slot() {
        let (queue, mut rx) = ChannelWorkQueue::new(1);
        let items: Vec<_> = (0..5)
            .map(|n| WorkItem::new("a", "windowed", json!(n)))
            .collect();
        queue.enqueue_batch(items).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_closed_receiver_is_an_error() {
        let (queue, rx) = ChannelWorkQueue::new(1);
        drop(rx);
        let result = queue
            .enqueue_batch(vec![WorkItem::new("a", "windowed", json!(null))])
            .await;
        assert!(matches!(result, Err(QueueError::Closed)));
    }
}
