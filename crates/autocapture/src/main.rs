//! `autocap` - CLI for autocapture
//!
//! This binary replays scripted page sessions through the capture engine and
//! inspects the stored event history.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;

use autocapture::cli::{
    output, Cli, Command, ConfigCommand, EventsCommand, OutputFormat, ReplayCommand,
};
use autocapture::engine::forward_to;
use autocapture::payload::CapturedPayload;
use autocapture::plugins::register_builtin;
use autocapture::script::{ScriptRunner, SessionScript};
use autocapture::storage::{Persistence, PersistenceKind, SqliteStorage};
use autocapture::{init_logging, AutoCapture, Config, PluginRegistry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Replay(cmd) => handle_replay(config, cmd).await,
        Command::Events(cmd) => handle_events(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_replay(mut config: Config, cmd: ReplayCommand) -> Result<()> {
    if let Some(kind) = &cmd.persistence {
        config.persistence = kind.parse()?;
    }
    if !cmd.capture.is_empty() {
        config.capture.clone_from(&cmd.capture);
    }

    let script = SessionScript::load(&cmd.script)
        .with_context(|| format!("failed to load script {}", cmd.script.display()))?;
    let mut builder = script.page_builder();
    if config.persistence == PersistenceKind::LocalStorage {
        let path = config.local_storage_path();
        let storage = SqliteStorage::open(&path)
            .with_context(|| format!("failed to open local storage at {}", path.display()))?;
        builder = builder.local_storage(Rc::new(storage));
    }
    let page = builder.build()?;
    let mut runner = ScriptRunner::new(script, page.clone())?;

    let registry = PluginRegistry::new();
    register_builtin(&registry)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let engine = AutoCapture::builder(config, page.clone())
        .registry(registry)
        .observer(forward_to(tx))
        .build()?;
    let printer = tokio::spawn(print_payloads(rx, cmd.format));

    engine.start();
    let mut clock = 0.0_f64;
    while let Some(at) = runner.next_at() {
        if cmd.realtime && at > clock {
            let gap = Duration::try_from_secs_f64((at - clock) / 1000.0).unwrap_or(Duration::ZERO);
            tokio::time::sleep(gap).await;
        }
        clock = clock.max(at);
        runner.dispatch_next();
        tokio::task::yield_now().await;
    }
    engine.stop();

    let stored = engine.get_captured_events().len();
    drop(engine);
    drop(runner);
    drop(page);

    let printed = printer.await.context("printer task failed")??;
    info!(printed, stored, "Replay finished");
    Ok(())
}

async fn print_payloads(
    mut rx: UnboundedReceiver<CapturedPayload>,
    format: OutputFormat,
) -> Result<usize> {
    let mut stdout = std::io::stdout();
    let mut batch = Vec::new();
    let mut count = 0;

    if format == OutputFormat::Table {
        writeln!(stdout, "{}", output::table_header())?;
    }
    while let Some(payload) = rx.recv().await {
        count += 1;
        match format {
            OutputFormat::Ndjson => writeln!(stdout, "{}", output::ndjson_line(&payload)?)?,
            OutputFormat::Table => writeln!(stdout, "{}", output::table_row(&payload))?,
            OutputFormat::Json => batch.push(payload),
        }
    }
    if format == OutputFormat::Json {
        writeln!(stdout, "{}", output::render(&batch, format)?)?;
    }
    Ok(count)
}

fn local_history(config: &Config) -> Result<Persistence> {
    let path = config.local_storage_path();
    let storage = SqliteStorage::open(&path)
        .with_context(|| format!("failed to open local storage at {}", path.display()))?;
    Ok(Persistence::web(
        PersistenceKind::LocalStorage,
        Rc::new(storage),
        config.max_events,
    ))
}

fn handle_events(config: &Config, cmd: EventsCommand) -> Result<()> {
    let history = local_history(config)?;
    match cmd {
        EventsCommand::List { limit, format } => {
            let mut events = history.events()?;
            if let Some(limit) = limit {
                let skip = events.len().saturating_sub(limit);
                events.drain(..skip);
            }
            println!("{}", output::render(&events, format)?);
        }
        EventsCommand::Clear => {
            history.clear_events()?;
            println!(
                "Cleared event history in {}",
                config.local_storage_path().display()
            );
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Capture]");
                println!("  Categories:         {}", config.capture.join(", "));
                println!("  Elements:           {}", config.elements.join(", "));
                println!("  Attributes:         {}", config.attributes.join(", "));
                println!("  Safelist:           {}", config.safelist.len());
                println!();
                println!("[Storage]");
                println!("  Persistence:        {}", config.persistence);
                println!("  Max events:         {}", config.max_events);
                println!(
                    "  Local storage:      {}",
                    config.local_storage_path().display()
                );
                println!();
                println!("[Privacy]");
                println!("  Mask text content:  {}", config.mask_text_content);
                println!("  Scrub mode:         {:?}", config.privacy.mode);
                println!("  Built-in patterns:  {}", config.privacy.builtin_patterns);
                println!("  Custom patterns:    {}", config.privacy.patterns.len());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
