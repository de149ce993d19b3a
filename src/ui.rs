use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use terminal_size::{Width, Height, terminal_size};

use crate::panel::{Affordance, PanelView};

pub fn print_header(subtitle: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "Mailsense".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();

    println!("  ✉ {} {}", name, version);
    println!("{}", format!("  {}", subtitle).cyan());

    println!("{}", line.black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}

pub fn print_thinking(msg: &str) {
    println!("  {} {}...", "∴".magenta(), msg);
}

/// Spinner shown while the panel is busy
pub fn busy_spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(90));
    spinner
}

pub fn print_affordance(affordance: Affordance) {
    match affordance {
        Affordance::Analyze => print_step(affordance.label()),
        Affordance::LoginFirst => print_warning(affordance.label()),
    }
}

/// Render the panel's result area
pub fn print_panel(view: &PanelView) {
    match view {
        PanelView::Summary(result) => {
            println!();
            println!("  {}", "Categories".bold());
            if result.categories.is_empty() {
                println!("    {}", "(none)".black().bold());
            } else {
                let badges: Vec<String> = result
                    .categories
                    .iter()
                    .map(|c| format!(" {} ", c).on_blue().white().bold().to_string())
                    .collect();
                println!("    {}", badges.join(" "));
            }
            println!();
            println!("  {}", "Summary".bold());
            println!("    {}", result.summary);
            println!();
        }
        PanelView::Error(message) => print_error(message),
    }
}
