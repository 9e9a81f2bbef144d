use crate::errors::AppError;
use crate::filter::RecordFilter;
use crate::model::ResponseRecord;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::Receiver;
use tokio_util::compat::TokioAsyncWriteCompatExt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Csv,
    JsonLines,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(LogFormat::Csv),
            "jsonl" | "json" => Ok(LogFormat::JsonLines),
            other => Err(AppError::Config(format!("unknown log format '{}'", other))),
        }
    }
}

const HEADER: [&str; 7] = ["seq", "received", "command", "status", "display", "fields", "raw"];

fn csv_row(r: &ResponseRecord) -> [String; 7] {
    let fields = r
        .fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";");
    [
        r.raw.seq.to_string(),
        r.raw.received.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        r.command.clone(),
        r.status.to_string(),
        r.display.clone().unwrap_or_default(),
        fields,
        r.raw.line.clone(),
    ]
}

/// Record-log stage: write every accepted record to `out_path`.
pub async fn write_record_log(
    out_path: &Path,
    format: LogFormat,
    filter: RecordFilter,
    rx: Receiver<Arc<ResponseRecord>>,
) -> Result<(), AppError> {
    let file = File::create(out_path)
        .await
        .map_err(|e| AppError::IO(format!("open record log '{}': {}", out_path.display(), e)))?;
    let count = write_records(BufWriter::new(file), format, filter, rx).await?;
    info!("record log wrote {} rows to {}", count, out_path.display());
    Ok(())
}

pub async fn write_records<W>(
    writer: W,
    format: LogFormat,
    filter: RecordFilter,
    rx: Receiver<Arc<ResponseRecord>>,
) -> Result<usize, AppError>
where
    W: AsyncWrite + Unpin,
{
    match format {
        LogFormat::Csv => write_csv(writer, filter, rx).await,
        LogFormat::JsonLines => write_jsonl(writer, filter, rx).await,
    }
}

async fn write_csv<W: AsyncWrite + Unpin>(
    writer: W,
    filter: RecordFilter,
    mut rx: Receiver<Arc<ResponseRecord>>,
) -> Result<usize, AppError> {
    // Bridge Tokio AsyncWrite -> futures::io::AsyncWrite for csv_async
    let mut wtr = csv_async::AsyncWriter::from_writer(writer.compat_write());

    wtr.write_record(&HEADER)
        .await
        .map_err(|e| AppError::IO(format!("csv write header: {}", e)))?;

    let mut count: usize = 0;
    while let Some(r) = rx.recv().await {
        if !filter.accept(&r) {
            continue;
        }
        wtr.write_record(&csv_row(&r))
            .await
            .map_err(|e| AppError::IO(format!("csv write row: {}", e)))?;
        count += 1;
    }

    wtr.flush()
        .await
        .map_err(|e| AppError::IO(format!("csv flush: {}", e)))?;
    Ok(count)
}

async fn write_jsonl<W: AsyncWrite + Unpin>(
    mut writer: W,
    filter: RecordFilter,
    mut rx: Receiver<Arc<ResponseRecord>>,
) -> Result<usize, AppError> {
    let mut count: usize = 0;
    while let Some(r) = rx.recv().await {
        if !filter.accept(&r) {
            continue;
        }
        let mut line = match serde_json::to_string(&*r) {
            Ok(s) => s,
            Err(e) => {
                warn!("record log: skip #{}: {}", r.raw.seq, e);
                continue;
            }
        };
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        count += 1;
    }
    writer.flush().await?;
    Ok(count)
}
