use crate::model::ResponseRecord;
use log::{debug, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

/// A downstream user of decoded records.
pub trait Consumer: Send + 'static {
    fn name(&self) -> &str;

    fn handle(&mut self, record: &ResponseRecord) -> anyhow::Result<()>;

    /// Called once after the queue closes.
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Drive `consumer` from its queue on its own task. A failing or panicking
/// `handle` is logged and the next record is processed. The consumer is
/// handed back when the queue closes.
pub fn spawn_consumer<C: Consumer>(mut consumer: C, mut rx: Receiver<Arc<ResponseRecord>>) -> JoinHandle<C> {
    tokio::spawn(async move {
        let mut handled: usize = 0;
        let mut failed: usize = 0;

        while let Some(rec) = rx.recv().await {
            handled += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| consumer.handle(&rec))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    warn!("{}: #{} ({}) failed: {:#}", consumer.name(), rec.raw.seq, rec.command, e);
                }
                Err(_) => {
                    failed += 1;
                    warn!("{}: #{} ({}) panicked", consumer.name(), rec.raw.seq, rec.command);
                }
            }
        }

        if let Err(e) = consumer.finish() {
            warn!("{}: finish failed: {:#}", consumer.name(), e);
        }
        debug!("{}: handled {} records, {} failed", consumer.name(), handled, failed);
        consumer
    })
}

/// Wait for a consumer task. A task that died (a panic in `finish`) is
/// logged and yields `None`.
pub async fn join_consumer<C>(name: &str, handle: JoinHandle<C>) -> Option<C> {
    match handle.await {
        Ok(consumer) => Some(consumer),
        Err(e) => {
            warn!("{} join: {}", name, e);
            None
        }
    }
}

/// Prints every response the way the monitor's response pane does.
pub struct ResponseEcho;

impl Consumer for ResponseEcho {
    fn name(&self) -> &str {
        "echo"
    }

    fn handle(&mut self, record: &ResponseRecord) -> anyhow::Result<()> {
        let text = match &record.display {
            Some(d) => d.clone(),
            None => record.fields.iter().skip(1).map(|(_, v)| v).collect::<Vec<_>>().join(","),
        };
        info!("R({}): {}", record.command, text);
        Ok(())
    }
}
