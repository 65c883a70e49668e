// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use textskel::app_config::{self, Config};
use textskel::file_utils::FileManager;
use textskel::pipeline::engine::run_batch;
use textskel::pipeline::{
    BatchItem, BatchReport, FilterRegistry, ItemStatus, Pipeline, PipelineDriver, ProgressSink, StepRegistry,
};
use textskel::resource::model::{BatchItemContext, RawDocument};
use textskel::steps::RawDocumentToEventsStep;
use textskel::{Event, EventType};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Options shared by the commands that load a configuration
#[derive(Parser, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path (default: <config dir>/textskel/config.json)
    #[arg(short, long)]
    config_path: Option<PathBuf>,

    /// Source locale (e.g., 'en', 'en-us')
    #[arg(short, long)]
    source_locale: Option<String>,

    /// Target locale (e.g., 'fr', 'pt-br')
    #[arg(short, long)]
    target_locale: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the events extracted from a document as JSON
    Extract {
        /// Document to extract
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Filter to use instead of the one of the file extension (e.g., 'okf_po')
        #[arg(long)]
        filter: Option<String>,

        /// Print only the event types
        #[arg(long)]
        types_only: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Run the configured pipeline over a file or a directory
    Roundtrip {
        /// Input file or directory to process
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        /// Directory receiving the rewritten documents
        #[arg(short, long, value_name = "DIR")]
        output_dir: PathBuf,

        /// Force overwrite of existing output files
        #[arg(short, long)]
        force_overwrite: bool,

        /// Steps to run, overriding the configuration (e.g., 'raw-to-events,segmentation,events-writer')
        #[arg(long, value_delimiter = ',')]
        steps: Option<Vec<String>>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for textskel
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// textskel - lossless text extraction and rewriting
///
/// Extracts the translatable text of documents into a stream of events and
/// writes the documents back from those events.
#[derive(Parser, Debug)]
#[command(name = "textskel")]
#[command(version)]
#[command(about = "Lossless text extraction and rewriting")]
#[command(long_about = "textskel extracts the translatable text of documents and writes them back unchanged, or with translations.

EXAMPLES:
    textskel extract messages.po                       # Print the events of a PO file
    textskel extract --types-only notes.txt            # Print only the event types
    textskel roundtrip docs/ -o out/                   # Run the configured pipeline over a directory
    textskel roundtrip a.po -o out/ -t de              # Use another target locale
    textskel roundtrip a.txt -o out/ --steps raw-to-events,splice-lines,events-writer
    textskel completions bash > textskel.bash          # Generate bash completions

CONFIGURATION:
    The configuration is read from <config dir>/textskel/config.json by default.
    You can specify a different file with --config-path. If the file doesn't
    exist, a default one is created.

STEPS:
    raw-to-events, events-writer, segmentation, leverage, splice-lines,
    linebreak-conversion, bom-conversion")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Tag and color for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("ERROR", "\x1B[1;31m"),
            Level::Warn => ("WARN ", "\x1B[1;33m"),
            Level::Info => ("INFO ", "\x1B[1;32m"),
            Level::Debug => ("DEBUG", "\x1B[1;36m"),
            Level::Trace => ("TRACE", "\x1B[1;35m"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (tag, color) = Self::style_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Progress bar over the items of a batch
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("=>-"));
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn item_started(&mut self, _index: usize, _total: usize, document: &str) {
        let name = Path::new(document)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| document.to_string());
        self.bar.set_message(format!("Processing: {}", name));
    }

    fn item_finished(&mut self, _index: usize, _status: &ItemStatus) {
        self.bar.inc(1);
    }

    fn batch_finished(&mut self, report: &BatchReport) {
        self.bar.finish_with_message(report.summary());
    }
}

fn main() -> Result<()> {
    // Info until the configuration says otherwise
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "textskel", &mut std::io::stdout());
            Ok(())
        }
        Commands::Extract {
            input,
            filter,
            types_only,
            common,
        } => {
            let config = load_config(&common, None)?;
            run_extract(&config, &input, filter.as_deref(), types_only)
        }
        Commands::Roundtrip {
            input_path,
            output_dir,
            force_overwrite,
            steps,
            common,
        } => {
            let config = load_config(&common, steps)?;
            run_roundtrip(&config, &input_path, &output_dir, force_overwrite)
        }
    }
}

/// Load the configuration, apply command line overrides and validate it
fn load_config(options: &CommonArgs, steps: Option<Vec<String>>) -> Result<Config> {
    if let Some(level) = &options.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config_path = options.config_path.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    debug!("Configuration loaded from {}", config_path.display());

    if let Some(source) = &options.source_locale {
        config.source_locale = source.clone();
    }
    if let Some(target) = &options.target_locale {
        config.target_locale = target.clone();
    }
    if let Some(level) = &options.log_level {
        config.log_level = level.clone().into();
    }
    if let Some(steps) = steps {
        config.pipeline.steps = steps;
    }

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

fn run_extract(config: &Config, input: &Path, filter: Option<&str>, types_only: bool) -> Result<()> {
    if !FileManager::file_exists(input) {
        return Err(anyhow!("Input file does not exist: {:?}", input));
    }
    let mut raw = RawDocument::from_file(input, &config.default_encoding, config.source_locale()?)
        .with_target_locale(config.target_locale()?);
    if let Some(filter) = filter {
        raw = raw.with_filter(filter);
    }

    let mut pipeline = Pipeline::new().with_step(Box::new(RawDocumentToEventsStep::new(FilterRegistry::new())));
    let events = run_batch(&mut pipeline, vec![(BatchItemContext::default(), Event::raw_document(raw))])
        .with_context(|| format!("Failed to extract {:?}", input))?;
    pipeline.destroy();

    let document_events: Vec<&Event> = events
        .iter()
        .filter(|e| {
            !matches!(
                e.event_type,
                EventType::StartBatch | EventType::EndBatch | EventType::StartBatchItem | EventType::EndBatchItem
            )
        })
        .collect();
    info!("{} event(s) extracted from {:?}", document_events.len(), input);

    let mut stdout = std::io::stdout();
    if types_only {
        for event in document_events {
            writeln!(stdout, "{}", event.event_type)?;
        }
    } else {
        let json = serde_json::to_string_pretty(&document_events).context("Failed to serialize events to JSON")?;
        writeln!(stdout, "{}", json)?;
    }
    Ok(())
}

fn run_roundtrip(config: &Config, input_path: &Path, output_dir: &Path, force_overwrite: bool) -> Result<()> {
    let filters = FilterRegistry::new();
    let inputs = if input_path.is_file() {
        vec![input_path.to_path_buf()]
    } else if input_path.is_dir() {
        FileManager::find_files(input_path, &filters.extensions())?
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    };
    if inputs.is_empty() {
        return Err(anyhow!("No supported documents found in: {:?}", input_path));
    }
    FileManager::ensure_dir(output_dir)?;

    let source_locale = config.source_locale()?;
    let target_locale = config.target_locale()?;
    let mut items = Vec::new();
    for input in inputs {
        let output = FileManager::generate_output_path(&input, input_path, output_dir);
        if output.exists() && !force_overwrite {
            warn!("Skipping {:?}, output already exists (use -f to force overwrite)", input);
            continue;
        }
        let raw = RawDocument::from_file(&input, &config.default_encoding, source_locale.clone());
        items.push(
            BatchItem::new(raw)
                .with_output(output)
                .with_target_locale(target_locale.clone()),
        );
    }
    if items.is_empty() {
        info!("Nothing to do");
        return Ok(());
    }

    let mut driver = PipelineDriver::from_config(config, &filters, &StepRegistry::new())?;
    info!("Pipeline: {}", driver.pipeline().step_names().join(" -> "));
    let mut progress = BarProgress::new(items.len());
    let report = driver.process_batch(items, &mut progress)?;
    driver.destroy();

    let failures = report.failures();
    if !failures.is_empty() {
        let log_path = output_dir.join("textskel.issues.log");
        for failure in &failures {
            if let Err(e) = FileManager::append_to_log_file(&log_path, &failure.to_string()) {
                warn!("Failed to write issues log: {}", e);
                break;
            }
        }
        error!("{} document(s) failed, see {}", failures.len(), log_path.display());
        return Err(anyhow!("Round trip completed with {} failure(s)", failures.len()));
    }

    info!("{}", report.summary());
    Ok(())
}
