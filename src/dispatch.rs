use crate::decoder::Separator;
use crate::errors::AppError;
use crate::model::{Fields, RawResponse, ResponseRecord, ResponseStatus};
use crate::registry::FieldRegistry;
use crate::resolver::{self, ResolvedStrategy};
use chrono::{FixedOffset, Local, Utc};
use log::{debug, info, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Which commands a subscriber wants to see.
#[derive(Clone, Debug)]
pub enum CommandFilter {
    All,
    Only(Vec<String>),
}

impl CommandFilter {
    pub fn only(commands: &[&str]) -> Self {
        CommandFilter::Only(commands.iter().map(|c| c.to_uppercase()).collect())
    }

    pub fn accepts(&self, command: &str) -> bool {
        match self {
            CommandFilter::All => true,
            CommandFilter::Only(cmds) => cmds.iter().any(|c| c == command),
        }
    }
}

struct Subscription {
    name: String,
    filter: CommandFilter,
    tx: Sender<Arc<ResponseRecord>>,
}

/// Turns raw lines into records and fans them out to subscribers.
pub struct Dispatcher {
    registry: Arc<FieldRegistry>,
    separator: Separator,
    tz_offset: Option<FixedOffset>,
    queue_depth: usize,
    next_seq: AtomicU64,
    subscriptions: Vec<Subscription>,
}

impl Dispatcher {
    pub fn new(registry: Arc<FieldRegistry>, separator: Separator) -> Self {
        Self {
            registry,
            separator,
            tz_offset: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            next_seq: AtomicU64::new(1),
            subscriptions: Vec::new(),
        }
    }

    /// Stamp receive times in this offset instead of local time.
    pub fn with_tz(mut self, tz_offset: Option<FixedOffset>) -> Self {
        self.tz_offset = tz_offset;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Register a consumer queue. Records are delivered in subscription order.
    pub fn subscribe(&mut self, name: &str, filter: CommandFilter) -> Receiver<Arc<ResponseRecord>> {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        debug!("subscribe {} ({:?})", name, filter);
        self.subscriptions.push(Subscription { name: name.to_string(), filter, tx });
        rx
    }

    /// Tag a line with the next sequence number and the receive time.
    pub fn raw_response(&self, line: impl Into<String>) -> RawResponse {
        let received = match self.tz_offset {
            Some(off) => Utc::now().with_timezone(&off),
            None => Local::now().fixed_offset(),
        };
        RawResponse {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            line: line.into(),
            received,
        }
    }

    /// Resolve, decode and render one response without publishing it.
    pub fn decode(&self, raw: RawResponse) -> ResponseRecord {
        let strategy = resolver::resolve(&self.registry, &raw, self.separator);
        let fields = strategy.decode(&raw, self.separator);
        let status = ResponseStatus::classify(&self.separator.tokens(&raw.line));
        let display = render_display(&strategy, &fields, raw.seq);
        ResponseRecord {
            command: strategy.command,
            raw,
            status,
            fields,
            display,
        }
    }

    pub fn dispatch(&self, line: impl Into<String>) -> Arc<ResponseRecord> {
        let raw = self.raw_response(line);
        trace!("#{} <- {:?}", raw.seq, raw.line);
        let record = Arc::new(self.decode(raw));
        self.publish(&record);
        record
    }

    /// Hand `record` to every interested subscriber without waiting on any.
    fn publish(&self, record: &Arc<ResponseRecord>) {
        for sub in &self.subscriptions {
            if !sub.filter.accepts(&record.command) {
                continue;
            }
            match sub.tx.try_send(Arc::clone(record)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("{}: queue full, dropped #{} ({})", sub.name, record.raw.seq, record.command);
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("{}: consumer gone, dropped #{} ({})", sub.name, record.raw.seq, record.command);
                }
            }
        }
    }
}

fn render_display(strategy: &ResolvedStrategy, fields: &Fields, seq: u64) -> Option<String> {
    let display = strategy.display?;
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| display(fields)));
    let err = match rendered {
        Ok(Ok(text)) => return Some(text),
        Ok(Err(e)) => AppError::DisplayRender {
            command: strategy.command.clone(),
            reason: e.to_string(),
        },
        Err(_) => AppError::DisplayRender {
            command: strategy.command.clone(),
            reason: "display routine panicked".into(),
        },
    };
    warn!("#{}: {}", seq, err);
    None
}

/// Dispatch lines until the source closes. Dropping the dispatcher at the end
/// closes every consumer queue.
pub async fn run_dispatch(dispatcher: Dispatcher, mut rx: Receiver<String>) -> Result<u64, AppError> {
    let mut count: u64 = 0;
    while let Some(line) = rx.recv().await {
        let record = dispatcher.dispatch(line);
        debug!("#{} {} {} {:?}", record.raw.seq, record.command, record.status, record.display);
        count += 1;
    }
    info!("dispatched {} responses", count);
    Ok(count)
}
