use argparse::{ArgumentParser, Collect, Store, StoreOption, StoreTrue};
use std::path::PathBuf;

use scanmon::dispatch::DEFAULT_QUEUE_DEPTH;
use scanmon::monitor::DEFAULT_IDLE_SECS;
use scanmon::titler::DEFAULT_TITLE;

pub struct CliArgs {
    pub input: Option<PathBuf>,
    pub separator: String,
    pub tz: Option<String>,
    pub timeout: f64,
    pub queue: usize,
    pub out: Option<PathBuf>,
    pub format: String,
    pub commands: Vec<String>,
    pub pattern: Option<String>,
    pub title: String,
    pub list_formatters: bool,
    pub log_level: String,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            input: None,
            separator: "comma".into(),
            tz: None,
            timeout: DEFAULT_IDLE_SECS,
            queue: DEFAULT_QUEUE_DEPTH,
            out: None,
            format: "csv".into(),
            commands: vec![],
            pattern: None,
            title: DEFAULT_TITLE.into(),
            list_formatters: false,
            log_level: "essential".into(),
        }
    }
}

impl CliArgs {
    /// `-` reads stdin like no input at all.
    pub fn input_path(&self) -> Option<&std::path::Path> {
        self.input.as_deref().filter(|p| p.as_os_str() != "-")
    }
}

pub fn parse_cli() -> CliArgs {
    let mut args = CliArgs::default();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Decode scanner responses and dispatch them to monitors");
        ap.refer(&mut args.input)
            .add_argument("input", StoreOption, "Response capture file (default or '-': stdin)");
        ap.refer(&mut args.separator)
            .add_option(&["-s", "--separator"], Store, "Token separator: comma|space");
        ap.refer(&mut args.tz)
            .add_option(&["--tz"], StoreOption, "Timezone for receive times (IANA name)");
        ap.refer(&mut args.timeout)
            .add_option(&["--timeout"], Store, "Idle seconds before a reception ends");
        ap.refer(&mut args.queue)
            .add_option(&["--queue"], Store, "Per-consumer queue depth");
        ap.refer(&mut args.out)
            .add_option(&["--out"], StoreOption, "Record log path");
        ap.refer(&mut args.format)
            .add_option(&["--format"], Store, "Record log format: csv|jsonl");
        ap.refer(&mut args.commands)
            .add_option(&["--cmd"], Collect, "Only log this command (repeatable)");
        ap.refer(&mut args.pattern)
            .add_option(&["--match"], StoreOption, "Only log raw lines matching this regex");
        ap.refer(&mut args.title)
            .add_option(&["--title"], Store, "Idle stream title");
        ap.refer(&mut args.list_formatters)
            .add_option(&["--list-formatters"], StoreTrue, "Print the formatter registry as CSV and exit");
        ap.refer(&mut args.log_level)
            .add_option(&["--log"], Store, "Log level (essential|debug|trace|warn|error)");
        ap.parse_args_or_exit();
    }
    args
}
