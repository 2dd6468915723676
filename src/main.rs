use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use webprinter_link::app::PrintFlow;
use webprinter_link::client::PrintClient;
use webprinter_link::config::{load_config_from_path, DiscoveryOverrides, FlowConfig};
use webprinter_link::detector::Detector;
use webprinter_link::installer::UpdateInfoFetcher;
use webprinter_link::launcher::{
    LaunchOutcome, Launcher, Navigator, RecordingNavigator, SystemNavigator,
};
use webprinter_link::ports::parse_ports_str;
use webprinter_link::server::{self, StubOptions, StubState};
use webprinter_link::session::new_session_id;

/// webprinter-link — find the local WebPrinter helper, wake it and send it print jobs.
#[derive(Debug, Parser)]
#[command(name = "webprinter-link", version, about, long_about = None)]
struct Cli {
    /// JSON config file; missing keys keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Candidate ports, e.g. `18731-18740` or `18731,18735`.
    #[arg(long, global = true)]
    ports: Option<String>,

    /// Candidate hosts, tried in order for each port.
    #[arg(long, global = true, value_delimiter = ',')]
    hosts: Option<Vec<String>>,

    /// Probe only this port.
    #[arg(long = "fixed-port", global = true)]
    fixed_port: Option<u16>,

    /// Per-probe timeout in milliseconds.
    #[arg(long = "timeout-ms", global = true)]
    timeout_ms: Option<u64>,

    /// Max probes in flight during the port fan-out.
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Print protocol URLs instead of opening them.
    #[arg(long = "dry-run", global = true, default_value_t = false)]
    dry_run: bool,

    /// Emit results as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check whether the helper is running and on which port.
    Detect,
    /// Fire a `webprinter://` URL at the helper.
    Launch {
        #[arg(value_enum)]
        action: LaunchAction,
        /// Session id for `open`/`print`; generated when omitted.
        #[arg(long)]
        session: Option<String>,
    },
    /// Wake the helper, find it and submit a print job.
    Print {
        #[arg(long = "preview-url", default_value = "")]
        preview_url: String,
        #[arg(long = "print-url", default_value = "")]
        print_url: String,
        /// Paper width in millimetres.
        #[arg(long)]
        width: f64,
        /// Paper height in millimetres.
        #[arg(long)]
        height: f64,
    },
    /// Show the newest published helper release.
    Latest {
        /// Also open the installer download.
        #[arg(long, default_value_t = false)]
        open: bool,
    },
    /// Run a stand-in helper API for manual testing.
    ServeStub {
        #[arg(long, default_value = "127.0.0.1:18731")]
        bind: String,
        /// Refuse every job with this message.
        #[arg(long = "reject-with")]
        reject_with: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LaunchAction {
    Status,
    Open,
    Print,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if cli.dry_run {
        let navigator = RecordingNavigator::default();
        let res = run(&cli, config, &navigator).await;
        if matches!(cli.command, Command::Print { .. }) {
            for url in navigator.urls() {
                println!("dry-run: {url}");
            }
        }
        res
    } else {
        run(&cli, config, SystemNavigator).await
    }
}

fn resolve_config(cli: &Cli) -> Result<FlowConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => load_config_from_path(path)?,
        None => FlowConfig::default(),
    };
    let ports = match cli.ports.as_deref() {
        Some(s) => Some(parse_ports_str(s)?),
        None => None,
    };
    config.discovery = config.discovery.merged(DiscoveryOverrides {
        fixed_port: cli.fixed_port,
        ports,
        hosts: cli.hosts.clone(),
        timeout: cli.timeout_ms.map(Duration::from_millis),
        concurrency: cli.concurrency,
        ..Default::default()
    });
    if config.discovery.fixed_port.is_none() && config.discovery.ports.is_empty() {
        bail!("no candidate ports configured");
    }
    Ok(config)
}

async fn run<N: Navigator>(cli: &Cli, config: FlowConfig, navigator: N) -> Result<()> {
    match &cli.command {
        Command::Detect => {
            let cancel = CancellationToken::new();
            let cancel_ctrlc = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                cancel_ctrlc.cancel();
            });
            let info = Detector::new()
                .check_installed_with_cancel(&config.discovery, cancel)
                .await;
            if cli.json {
                print_json(&info)?;
            } else if info.installed {
                println!(
                    "WebPrinter is running on port {} (version {})",
                    info.port.map(|p| p.to_string()).unwrap_or_default(),
                    info.version.as_deref().unwrap_or("-")
                );
            } else {
                println!("WebPrinter was not detected");
            }
        }
        Command::Launch { action, session } => {
            let launcher = Launcher::new(navigator);
            let sid = session.clone().unwrap_or_else(new_session_id);
            let outcome = match action {
                LaunchAction::Status => launcher.launch_status(),
                LaunchAction::Open => launcher.launch_open(&sid),
                LaunchAction::Print => launcher.launch_print(&sid),
            };
            report_launch(cli.json, &outcome)?;
        }
        Command::Print {
            preview_url,
            print_url,
            width,
            height,
        } => {
            let submit_timeout = config.discovery.timeout * 5;
            let flow = PrintFlow::new(
                config,
                Detector::new(),
                Launcher::new(navigator),
                PrintClient::new().with_timeout(submit_timeout),
            );
            let receipt = flow
                .start_print(preview_url, print_url, *width, *height)
                .await?;
            if cli.json {
                print_json(&receipt)?;
            } else {
                println!(
                    "Print job sent (session {}, port {})",
                    receipt.session, receipt.port
                );
            }
        }
        Command::Latest { open } => {
            let info = UpdateInfoFetcher::default().get_latest_info().await;
            if cli.json {
                print_json(&info)?;
            } else {
                println!("latest version : {}", info.version.as_deref().unwrap_or("-"));
                println!("manifest       : {}", info.manifest_url);
                println!("download       : {}", info.download_url);
            }
            if *open {
                let outcome = Launcher::new(navigator).open_install_page(&info.download_url);
                report_launch(cli.json, &outcome)?;
            }
        }
        Command::ServeStub { bind, reject_with } => {
            let state = StubState::new(StubOptions {
                reject_with: reject_with.clone(),
                ..Default::default()
            });
            let addr = server::spawn_stub(bind, state).await?;
            println!("Stub helper on http://{addr} (Ctrl+C to stop)");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    Ok(())
}

fn report_launch(json: bool, outcome: &LaunchOutcome) -> Result<()> {
    if json {
        return print_json(outcome);
    }
    match &outcome.error {
        None => println!("{}", outcome.url),
        Some(e) => println!("{} (failed: {e})", outcome.url),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
