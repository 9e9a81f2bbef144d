mod cli;

use scanmon::consumer::{self, spawn_consumer};
use scanmon::decoder::Separator;
use scanmon::dispatch::{self, CommandFilter, Dispatcher};
use scanmon::errors::AppError;
use scanmon::record_sink::{self, LogFormat};
use scanmon::registry::FieldRegistry;
use scanmon::{acks, filter, listing, monitor, source, titler};
use chrono::{FixedOffset, Utc};
use chrono_tz::Tz;
use env_logger::Env;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn setup_logging(level: &str) {
    let env = Env::default().filter_or("RUST_LOG", match level {
        "essential" => "info",
        "debug" => "debug",
        "trace" => "trace",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    });
    env_logger::Builder::from_env(env).init();
}

fn compute_tz_offset(args_tz: &Option<String>) -> Option<FixedOffset> {
    if let Some(tzname) = args_tz.as_ref() {
        match tzname.parse::<Tz>() {
            Ok(tz) => {
                let now_utc = Utc::now();
                let now_tz = now_utc.with_timezone(&tz);
                let seconds = (now_tz.naive_local() - now_tz.naive_utc()).num_seconds();
                FixedOffset::east_opt(seconds as i32)
            }
            Err(_) => {
                warn!("Timezone parse failed; falling back to local");
                None
            }
        }
    } else {
        None
    }
}

async fn join_stage<T>(name: &str, handle: JoinHandle<Result<T, AppError>>) -> Result<T, AppError> {
    handle
        .await
        .unwrap_or_else(|e| Err(AppError::Other(format!("{name} join: {e}"))))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), AppError> {
    let args = cli::parse_cli();
    setup_logging(&args.log_level);

    // Startup fails here, before anything is read, if two formatters collide.
    let registry = Arc::new(FieldRegistry::builtin()?);

    if args.list_formatters {
        return listing::write_registry(&registry, std::io::stdout().lock());
    }

    let separator: Separator = args.separator.parse()?;
    let format: LogFormat = args.format.parse()?;
    let record_filter = filter::RecordFilter::new(&args.commands, args.pattern.as_deref())?;
    let tz_offset = compute_tz_offset(&args.tz);
    let idle_secs = monitor::idle_secs(args.timeout)?;

    info!(
        "Starting: {} formatters, separator {:?}, input {}",
        registry.len(),
        separator,
        args.input_path().map(|p| p.display().to_string()).unwrap_or_else(|| "stdin".into())
    );

    let mut dispatcher = Dispatcher::new(Arc::clone(&registry), separator)
        .with_tz(tz_offset)
        .with_queue_depth(args.queue);

    // Subscription order is delivery order.
    let monitor_rx = dispatcher.subscribe("channel-monitor", CommandFilter::only(&["GLG"]));
    let titler_rx = dispatcher.subscribe("title-updater", CommandFilter::only(&["GLG"]));
    let acks_rx = dispatcher.subscribe("ack-tracker", CommandFilter::only(acks::ACK_COMMANDS));
    let echo_rx = dispatcher.subscribe("echo", CommandFilter::All);
    let log_rx = args.out.as_ref().map(|_| dispatcher.subscribe("record-log", CommandFilter::All));

    let (title_tx, title_rx) = mpsc::channel::<String>(64);
    let title_sink: Arc<dyn titler::TitleSink> = Arc::new(titler::LogTitleSink);

    let monitor_task = spawn_consumer(monitor::ChannelMonitor::new(idle_secs, None), monitor_rx);
    let titler_task = spawn_consumer(titler::TitleUpdater::new(idle_secs, &args.title, title_tx), titler_rx);
    let acks_task = spawn_consumer(acks::AckTracker::new(), acks_rx);
    let echo_task = spawn_consumer(consumer::ResponseEcho, echo_rx);
    let title_task = tokio::spawn(titler::run_title_sink(title_rx, title_sink));

    let record_log = match (args.out.clone(), log_rx) {
        (Some(out_path), Some(rx)) => Some(tokio::spawn(async move {
            record_sink::write_record_log(&out_path, format, record_filter, rx).await
        })),
        _ => None,
    };

    // 1) Line source
    let (line_tx, line_rx) = mpsc::channel::<String>(args.queue.max(1));
    let input = args.input_path().map(|p| p.to_path_buf());
    let producer = tokio::spawn(async move { source::stream_lines(input.as_deref(), line_tx).await });

    // 2) Dispatch until end of stream; dropping the dispatcher closes consumer queues
    let dispatch_task = tokio::spawn(dispatch::run_dispatch(dispatcher, line_rx));

    let p_res = join_stage("producer", producer).await;
    let d_res = join_stage("dispatch", dispatch_task).await;

    let monitor = consumer::join_consumer("channel-monitor", monitor_task).await;
    let acks = consumer::join_consumer("ack-tracker", acks_task).await;
    // The updater owns the title queue sender; the sink stops once it is dropped.
    consumer::join_consumer("title-updater", titler_task).await;
    consumer::join_consumer("echo", echo_task).await;
    let t_res = join_stage("title sink", title_task).await;
    let l_res = match record_log {
        Some(h) => join_stage("record log", h).await,
        None => Ok(()),
    };

    p_res?;
    d_res?;
    t_res?;
    l_res?;
    info!(
        "Done. {} receptions, {} acknowledgements confirmed, {} rejected",
        monitor.map_or(0, |m| m.completed()),
        acks.as_ref().map_or(0, |a| a.confirmed),
        acks.as_ref().map_or(0, |a| a.rejected)
    );
    Ok(())
}
