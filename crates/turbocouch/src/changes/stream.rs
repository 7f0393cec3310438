//! Consumer side of a started follower.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use pin_project::pin_project;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;

use super::follower::{Batch, Producer, Shared, wait_for_stop};
use crate::error::Result;
use crate::types::ChangesResultItem;

/// Change items of a started [`ChangesFollower`](super::ChangesFollower), in
/// server order.
///
/// The producer task is spawned on the first poll, so the stream must be
/// polled inside a tokio runtime. An `Err` item ends the stream. Dropping the
/// stream cancels the producer.
#[pin_project]
pub struct ChangesStream {
    #[pin]
    inner: BoxStream<'static, Result<ChangesResultItem>>,
}

impl ChangesStream {
    pub(crate) fn new(
        shared: Arc<Shared>,
        producer: Producer,
        rx: mpsc::Receiver<Batch>,
        drained: Arc<Semaphore>,
    ) -> Self {
        let consumer = Consumer {
            stop: shared.subscribe(),
            shared,
            producer: Some(producer),
            task: None,
            rx,
            drained,
            batch: Vec::new().into_iter(),
            owes_permit: false,
            done: false,
        };
        let inner = stream::unfold(consumer, |mut consumer| async move {
            let item = consumer.next_item().await?;
            Some((item, consumer))
        })
        .boxed();
        Self { inner }
    }
}

impl std::fmt::Debug for ChangesStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesStream").finish_non_exhaustive()
    }
}

impl Stream for ChangesStream {
    type Item = Result<ChangesResultItem>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.inner.poll_next(cx)
    }
}

/// Aborts the producer when the stream goes away.
struct ProducerTask(JoinHandle<()>);

impl Drop for ProducerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Consumer {
    shared: Arc<Shared>,
    stop: watch::Receiver<bool>,
    producer: Option<Producer>,
    task: Option<ProducerTask>,
    rx: mpsc::Receiver<Batch>,
    drained: Arc<Semaphore>,
    batch: std::vec::IntoIter<ChangesResultItem>,
    owes_permit: bool,
    done: bool,
}

impl Consumer {
    async fn next_item(&mut self) -> Option<Result<ChangesResultItem>> {
        if self.done {
            return None;
        }
        loop {
            if self.shared.is_stopped() {
                self.finish();
                return None;
            }
            if let Some(item) = self.batch.next() {
                if !self.shared.take_one() {
                    self.finish();
                    return None;
                }
                return Some(Ok(item));
            }

            if let Some(producer) = self.producer.take() {
                self.task = Some(ProducerTask(tokio::spawn(producer.run())));
            }
            if self.owes_permit {
                self.drained.add_permits(1);
                self.owes_permit = false;
            }

            let received = tokio::select! {
                biased;
                _ = wait_for_stop(&mut self.stop) => None,
                received = self.rx.recv() => received,
            };
            match received {
                Some(Ok(batch)) => {
                    self.batch = batch.into_iter();
                    self.owes_permit = true;
                }
                Some(Err(e)) => {
                    self.finish();
                    return Some(Err(e));
                }
                None => {
                    self.finish();
                    return None;
                }
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.batch = Vec::new().into_iter();
        self.shared.stop();
        self.task = None;
    }
}
