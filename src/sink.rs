use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SinkError;
use crate::group::TargetGroup;

/// Downstream consumer of published batches.
///
/// Batches arrive in the order they were computed. An empty batch, or one
/// made only of retraction markers, is legal and must be accepted. Retrying
/// a failed publish is up to the implementation.
#[async_trait]
pub trait Sink: Send {
    async fn publish(&mut self, batch: Vec<TargetGroup>) -> Result<(), SinkError>;
}

#[async_trait]
impl Sink for mpsc::Sender<Vec<TargetGroup>> {
    async fn publish(&mut self, batch: Vec<TargetGroup>) -> Result<(), SinkError> {
        self.send(batch).await.map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl Sink for mpsc::UnboundedSender<Vec<TargetGroup>> {
    async fn publish(&mut self, batch: Vec<TargetGroup>) -> Result<(), SinkError> {
        self.send(batch).map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Box<S> {
    async fn publish(&mut self, batch: Vec<TargetGroup>) -> Result<(), SinkError> {
        (**self).publish(batch).await
    }
}
