use crate::consumer::Consumer;
use crate::errors::AppError;
use crate::model::ResponseRecord;
use crate::monitor::{GlgReading, ReceptionEvent, ReceptionTracker};
use anyhow::bail;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, Sender};

pub const DEFAULT_TITLE: &str = "Scanner";

/// Where stream titles end up. Implementations may block.
pub trait TitleSink: Send + Sync {
    fn update_title(&self, title: &str) -> Result<(), AppError>;
}

/// Logs each title instead of pushing it anywhere.
pub struct LogTitleSink;

impl TitleSink for LogTitleSink {
    fn update_title(&self, title: &str) -> Result<(), AppError> {
        info!("title: {}", title);
        Ok(())
    }
}

/// Builds `System|Group|Channel` titles from GLG polls. The idle title is
/// queued at construction and again whenever a reception closes.
pub struct TitleUpdater {
    tracker: ReceptionTracker,
    idle_title: String,
    tx: Sender<String>,
}

impl TitleUpdater {
    pub fn new(idle_secs: f64, idle_title: &str, tx: Sender<String>) -> Self {
        let updater = Self {
            tracker: ReceptionTracker::new(idle_secs),
            idle_title: idle_title.to_string(),
            tx,
        };
        if updater.tx.try_send(updater.idle_title.clone()).is_err() {
            warn!("titler: could not queue idle title");
        }
        updater
    }

    fn post(&self, title: String) -> anyhow::Result<()> {
        debug!("titler: queue {:?}", title);
        if self.tx.try_send(title).is_err() {
            bail!("title queue unavailable");
        }
        Ok(())
    }
}

impl Consumer for TitleUpdater {
    fn name(&self) -> &str {
        "title-updater"
    }

    fn handle(&mut self, record: &ResponseRecord) -> anyhow::Result<()> {
        let Some(reading) = GlgReading::from_record(record) else {
            return Ok(());
        };
        for event in self.tracker.observe(&reading) {
            match event {
                ReceptionEvent::Started(rec) => {
                    self.post(format!("{}|{}|{}", rec.system, rec.group, rec.channel))?;
                }
                ReceptionEvent::Closed(_) => self.post(self.idle_title.clone())?,
            }
        }
        Ok(())
    }
}

/// Apply queued titles to `sink` one at a time, off the async workers.
pub async fn run_title_sink(mut rx: Receiver<String>, sink: Arc<dyn TitleSink>) -> Result<(), AppError> {
    let mut updates: usize = 0;
    while let Some(title) = rx.recv().await {
        let s = Arc::clone(&sink);
        let result = tokio::task::spawn_blocking(move || s.update_title(&title))
            .await
            .map_err(|e| AppError::Other(format!("title update join: {e}")))?;
        match result {
            Ok(()) => updates += 1,
            Err(e) => warn!("title update failed: {}", e),
        }
    }
    debug!("titler: {} updates", updates);
    Ok(())
}
