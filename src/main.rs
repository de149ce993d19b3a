//! Mailsense CLI entry point

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use mailsense::host::Host;
use mailsense::page::FileDocument;
use mailsense::panel::PanelController;
use mailsense::popup::{PanelOpener, Popup, PopupOutcome};
use mailsense::tabs::LocalTabs;
use mailsense::ui;

#[derive(Parser)]
#[command(name = "mailsense")]
#[command(about = "✉ Mailsense - categorize and summarize your email")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the Mailsense configuration
    Onboard,

    /// Log in with Google if needed, then open the panel
    Open {
        /// Email to analyze once the panel is open
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Analyze an email with the panel
    Analyze {
        /// File holding the email text
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Forget the stored Google token
    Logout,

    /// Answer newline-delimited JSON messages on stdin until it closes
    Serve,

    /// Show login and service status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            mailsense::config::onboard()?;
        }

        Commands::Open { file } => {
            let host = Host::start(mailsense::config::load()?)?;
            let opener = TerminalPanel::new(host.panel(), host.tabs.clone(), file);
            let popup = Popup::new(host.store.clone(), host.handle.clone(), opener);

            ui::print_step(popup.action().label());
            match popup.click().await? {
                PopupOutcome::Opened => {}
                PopupOutcome::LoginFailed(message) => {
                    ui::print_error(&message);
                    std::process::exit(1);
                }
            }
        }

        Commands::Analyze { file } => {
            let host = Host::start(mailsense::config::load()?)?;
            let panel = TerminalPanel::new(host.panel(), host.tabs.clone(), Some(file));
            panel.open_panel().await?;
        }

        Commands::Logout => {
            let host = Host::start(mailsense::config::load()?)?;
            host.coordinator.logout().await?;
            ui::print_success("Logged out successfully");
        }

        Commands::Serve => {
            let host = Host::start(mailsense::config::load()?)?;
            run_serve(&host).await?;
        }

        Commands::Status => {
            let host = Host::start(mailsense::config::load()?)?;
            run_status(&host).await;
        }
    }

    Ok(())
}

/// The panel, rendered to the terminal
struct TerminalPanel {
    panel: PanelController,
    tabs: Arc<LocalTabs>,
    file: Option<PathBuf>,
}

impl TerminalPanel {
    fn new(panel: PanelController, tabs: Arc<LocalTabs>, file: Option<PathBuf>) -> Self {
        Self { panel, tabs, file }
    }
}

#[async_trait]
impl PanelOpener for TerminalPanel {
    async fn open_panel(&self) -> mailsense::Result<()> {
        ui::print_header("Email Summarizer");

        let affordance = self.panel.affordance();
        ui::print_affordance(affordance);
        if !affordance.is_enabled() {
            return Ok(());
        }

        let Some(file) = &self.file else {
            ui::print_step("Pass --file <email.txt> to analyze an email.");
            return Ok(());
        };

        self.tabs.open(Arc::new(FileDocument::new(file)));

        let spinner = ui::busy_spinner("Analyzing email");
        let view = self.panel.analyze().await;
        spinner.finish_and_clear();

        ui::print_panel(&view);
        Ok(())
    }
}

async fn run_serve(host: &Host) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = host.handle.send_raw(&line).await? {
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

async fn run_status(host: &Host) {
    ui::print_header("Status");

    let session = host.coordinator.session().await;
    if session.is_valid(chrono::Utc::now().timestamp_millis()) {
        let expires = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(session.expiry_ms())
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| session.expiry_ms().to_string());
        ui::print_success(&format!("Logged in, token valid until {}", expires));
    } else {
        ui::print_warning("Not logged in (run 'mailsense open')");
    }

    println!("  API: {}", host.config.api_base_url);
    match host.api.health().await {
        Ok(true) => ui::print_success("Summarize service is up"),
        Ok(false) => ui::print_warning("Summarize service answered but reports not ok"),
        Err(e) => ui::print_error(&format!("Summarize service unreachable: {}", e)),
    }
}
