// Terminal output for the interactive subcommands
use colored::Colorize;
use firehose_metrics::InternalMetrics;
use std::fmt::Display;
use std::path::Path;

pub fn print_banner(title: &str) {
    println!("\n{}", title.bold().cyan());
    println!("{}", "=".repeat(title.len()).cyan());
}

pub fn print_verdict(ok: bool, text: &str) {
    if ok {
        println!("{} {}", "✓".green().bold(), text.green());
    } else {
        println!("{} {}", "✗".red().bold(), text.red());
    }
}

pub fn print_field(label: &str, value: impl Display) {
    println!("  {:<20} {}", format!("{}:", label).dimmed(), value);
}

pub fn print_caveat(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Lists `values`, or "all" when the allow-list is empty.
pub fn print_allow_list(label: &str, values: &[String]) {
    if values.is_empty() {
        print_field(label, "all");
    } else {
        print_field(label, values.join(", "));
    }
}

/// Ingestion totals after a replay. Goes to stderr so the rendered scrape
/// on stdout stays machine-readable.
pub fn print_replay_summary(path: &Path, replayed: usize, metrics: &InternalMetrics) {
    eprintln!(
        "{} {} envelopes from {}",
        "Replayed".bold(),
        replayed,
        path.display()
    );
    eprintln!(
        "  container metrics {}/{}  counter events {}/{}  value metrics {}/{}",
        metrics.total_container_metrics_processed,
        metrics.total_container_metrics_received,
        metrics.total_counter_events_processed,
        metrics.total_counter_events_received,
        metrics.total_value_metrics_processed,
        metrics.total_value_metrics_received,
    );
}
