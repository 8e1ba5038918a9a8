// Main entry point - Dependency injection and runtime wiring
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{Router, routing::get};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::LinesStream};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::channel::ViewProfile;
use crate::application::clock::SystemClock;
use crate::application::command::OperatorCommand;
use crate::application::session::{EventSender, Session, SessionEvent};
use crate::application::sink::{FanoutSink, PresentationSink};
use crate::application::unit_directory::UnitDirectory;
use crate::domain::unit::{UnitId, UnitListing};
use crate::infrastructure::config::{MonitorConfig, load_monitor_config};
use crate::infrastructure::http_directory::HttpUnitDirectory;
use crate::infrastructure::ws_connector::WsConnector;
use crate::presentation::app_state::AppState;
use crate::presentation::board::StatusBoard;
use crate::presentation::console::ConsoleSink;
use crate::presentation::handlers::{board_state, health_check, hourly, list_units, totals, unit_detail};
use crate::presentation::operator::{HELP, parse_command};

#[derive(Parser, Debug)]
#[command(name = "production-monitor", version, about = "Live production line dashboard")]
struct Args {
    /// Configuration file; missing files fall back to defaults and MONITOR__ variables
    #[arg(long, default_value = "config/monitor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the units the backend can monitor
    Units,
    /// Multi-unit dashboard driven by operator commands on stdin
    Dashboard {
        /// Units to start collecting immediately
        #[arg(long = "unit")]
        units: Vec<String>,
    },
    /// Hourly breakdown of one unit for the current shift
    Hourly { unit: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("production_monitor=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_monitor_config(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    // Create adapters (infrastructure layer)
    let directory = HttpUnitDirectory::new(
        config.backend.http_base().to_string(),
        config.backend.connect_timeout(),
    )?;

    match args.command {
        Command::Units => print_units(&directory).await,
        Command::Dashboard { units } => {
            let units = units.into_iter().map(UnitId::new).collect();
            run_dashboard(&config, &directory, units).await
        }
        Command::Hourly { unit } => run_hourly(&config, UnitId::new(unit)).await,
    }
}

async fn print_units(directory: &HttpUnitDirectory) -> anyhow::Result<()> {
    match UnitListing::from_ids(directory.list_units().await?) {
        UnitListing::NoUnits => println!("No production units available"),
        UnitListing::Units(ids) => ids.iter().for_each(|id| println!("{id}")),
    }
    Ok(())
}

async fn run_dashboard(
    config: &MonitorConfig,
    directory: &HttpUnitDirectory,
    units: Vec<UnitId>,
) -> anyhow::Result<()> {
    let (events, session) = start_session(config, config.dashboard_profile()).await?;

    // The lookup failing is shown, not fatal: the operator can still select known units.
    let lookup = match directory.list_units().await {
        Ok(ids) => OperatorCommand::UnitsLoaded(UnitListing::from_ids(ids)),
        Err(e) => OperatorCommand::UnitsFailed(format!("{e:#}")),
    };
    send(&events, lookup);
    if !units.is_empty() {
        send(&events, OperatorCommand::Start(units));
    }

    tracing::info!("{HELP}");
    tokio::spawn(read_operator_input(events.clone()));

    wait_for_exit(events, session).await
}

async fn run_hourly(config: &MonitorConfig, unit: UnitId) -> anyhow::Result<()> {
    let (events, session) = start_session(config, config.hourly_profile()).await?;
    send(&events, OperatorCommand::Select(unit));
    wait_for_exit(events, session).await
}

async fn start_session(
    config: &MonitorConfig,
    profile: ViewProfile,
) -> anyhow::Result<(EventSender, tokio::task::JoinHandle<()>)> {
    let board = StatusBoard::new();
    if let Some(addr) = config.status.listen {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind status API on {addr}"))?;
        let router = status_router(board.clone());
        tracing::info!(%addr, "status API listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "status API stopped");
            }
        });
    }

    let sinks: Vec<Arc<dyn PresentationSink>> = vec![Arc::new(ConsoleSink), Arc::new(board)];
    let connector = Arc::new(WsConnector::new(
        config.backend.ws_base(),
        config.backend.connect_timeout(),
    ));

    let shifts = config.shift_table();
    for shift in shifts.shifts() {
        tracing::info!(
            shift = shift.name(),
            start_hour = shift.start_hour(),
            end_hour = shift.end_hour(),
            "shift configured"
        );
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::new(
        profile,
        shifts,
        connector,
        Arc::new(FanoutSink::new(sinks)),
        Arc::new(SystemClock),
        tx.clone(),
    );
    Ok((tx, tokio::spawn(session.run(rx))))
}

fn status_router(board: StatusBoard) -> Router {
    let state = Arc::new(AppState { board });
    Router::new()
        .route("/healthz", get(health_check))
        .route("/board", get(board_state))
        .route("/units", get(list_units))
        .route("/units/:id", get(unit_detail))
        .route("/totals", get(totals))
        .route("/hourly", get(hourly))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn read_operator_input(events: EventSender) {
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to read operator input");
                break;
            }
        };
        match parse_command(&line) {
            Ok(Some(command)) => {
                let quit = command == OperatorCommand::Quit;
                if !send(&events, command) || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{e}; {HELP}"),
        }
    }
    tracing::debug!("operator input closed");
}

async fn wait_for_exit(
    events: EventSender,
    mut session: tokio::task::JoinHandle<()>,
) -> anyhow::Result<()> {
    tokio::select! {
        result = &mut session => return result.context("session task failed"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::info!("interrupted, closing channels");
            send(&events, OperatorCommand::Quit);
        }
    }
    session.await.context("session task failed")
}

fn send(events: &EventSender, command: OperatorCommand) -> bool {
    events.send(SessionEvent::Operator(command)).is_ok()
}
