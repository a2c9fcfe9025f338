mod aggregate;
mod app;
mod cli;
mod config;
mod detail;
mod format;
mod input;
mod k8s;
mod list;
mod model;
mod statusbar;
mod table;
#[cfg(test)]
mod testing;
mod ui;
mod view;

use aggregate::Aggregator;
use anyhow::{Context, Result};
use app::{App, AppCommand};
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::StreamExt;
use input::Action;
use k8s::{ClusterSource, KubeGateway};
use list::ListKind;
use model::Filter;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let settings = Settings::load(&args)?;
    if let Some(source) = &settings.source {
        info!("loaded dashboard config {}", source.display());
    }

    let gateway =
        KubeGateway::connect(settings.kubeconfig.as_deref(), settings.context.clone()).await?;
    info!(
        "connected to {} using context {}",
        gateway.cluster_identity(),
        gateway.context()
    );

    let mut app = App::new(
        settings.view,
        Filter::with_namespace(settings.namespace.clone()),
        settings.sorts,
        gateway.cluster_identity().to_string(),
    )
    .with_log_tail(settings.log_tail_lines);

    run(&mut app, &gateway, settings.exit_on_error).await
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::sink).try_init();
        }
    }

    Ok(())
}

async fn run<C: ClusterSource>(app: &mut App, source: &C, exit_on_error: bool) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, source, exit_on_error).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )
    .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

/// Single owner of the app: ticks, input and signals are handled one at a
/// time, so a refresh never overlaps a key-driven rebuild of the same view.
async fn run_loop<C: ClusterSource>(
    terminal: &mut TuiTerminal,
    app: &mut App,
    source: &C,
    exit_on_error: bool,
) -> Result<()> {
    let size = terminal.size().context("failed to read terminal size")?;
    app.resize(Rect::new(0, 0, size.width, size.height));
    refresh(app, source, exit_on_error).await?;

    let mut reader = EventStream::new();
    let mut ticker = interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.reset();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(key) {
                            handle_action(terminal, app, source, action, exit_on_error).await?;
                        }
                    }
                    Some(Ok(Event::Mouse(mouse))) => {
                        if let Some(action) = input::map_mouse(mouse) {
                            handle_action(terminal, app, source, action, exit_on_error).await?;
                        }
                    }
                    Some(Ok(Event::Resize(width, height))) => {
                        app.resize(Rect::new(0, 0, width, height));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        return Err(error).context("failed to read terminal event");
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                refresh(app, source, exit_on_error).await?;
            }
            _ = &mut shutdown => {
                info!("termination signal received");
                app.stop();
            }
        }
    }

    Ok(())
}

async fn handle_action<C: ClusterSource>(
    terminal: &mut TuiTerminal,
    app: &mut App,
    source: &C,
    action: Action,
    exit_on_error: bool,
) -> Result<()> {
    debug!("action={action:?}");
    let command = app.apply_action(action);
    terminal
        .draw(|frame| ui::render(frame, app))
        .context("failed to render terminal frame")?;
    execute_app_command(app, source, command, exit_on_error).await
}

async fn execute_app_command<C: ClusterSource>(
    app: &mut App,
    source: &C,
    command: AppCommand,
    exit_on_error: bool,
) -> Result<()> {
    match command {
        AppCommand::None => Ok(()),
        AppCommand::Refresh => refresh(app, source, exit_on_error).await,
        AppCommand::LoadListOptions(kind) => {
            let aggregator = Aggregator::new(source);
            let values = match kind {
                ListKind::Node => aggregator.node_names().await,
                _ => aggregator.namespaces().await,
            };
            let values = match values {
                Ok(values) => Some(values),
                Err(error) => {
                    warn!("failed to load {kind:?} choices: {}", compact_error(&error));
                    None
                }
            };
            app.show_live_list(kind, values);
            Ok(())
        }
    }
}

/// Refreshes the active view. Failures either end the session or stay on
/// screen until the next successful refresh.
async fn refresh<C: ClusterSource>(app: &mut App, source: &C, exit_on_error: bool) -> Result<()> {
    match app.refresh(source).await {
        Ok(()) => Ok(()),
        Err(error) if exit_on_error => Err(error.context("dashboard refresh failed")),
        Err(error) => {
            let message = compact_error(&error);
            warn!("refresh failed: {message}");
            app.set_refresh_error(message);
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for interrupt: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                warn!("failed to listen for SIGTERM: {error}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("; ")
}
