// Colored terminal output for reports, alerts and batch summaries.
//
// main.rs and the TerminalSink delegate here; nothing in this module
// decides anything, it only prints.

use std::collections::BTreeMap;

use colored::{ColoredString, Colorize};

use super::truncate_chars;
use crate::analysis::{AnalysisOutcome, UserReport};
use crate::batch::dataset::PreprocessStats;
use crate::batch::BatchSummary;
use crate::monitor::alert::{Alert, TOP_ALERT_ITEMS};
use crate::toxicity::{Classification, Label};

pub fn colorize_label(label: Label) -> ColoredString {
    match label {
        Label::Toxic => label.as_str().red().bold(),
        Label::NonToxic => label.as_str().green(),
        Label::Unknown => label.as_str().yellow(),
        Label::Error => label.as_str().bright_red(),
        Label::Empty => label.as_str().dimmed(),
    }
}

pub fn display_classification(text: &str, result: &Classification) {
    println!(
        "  {} [{:.3}] {}",
        colorize_label(result.label),
        result.score,
        truncate_chars(text, 120).dimmed()
    );
}

/// Display a user report with its most toxic items.
pub fn display_report(report: &UserReport, top_n: usize) {
    println!(
        "\n{}",
        format!("=== Toxicity report for u/{} ===", report.username).bold()
    );
    let rate = report
        .toxicity_rate()
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "  Toxic items: {}/{} ({})",
        report.toxic_count, report.total_count, rate
    );
    if report.error_count > 0 {
        println!(
            "  {} {} items could not be classified",
            "!".yellow(),
            report.error_count
        );
    }

    let top = report.top_toxic(top_n);
    if !top.is_empty() {
        println!("\n  Most toxic items:");
        for (i, analyzed) in top.iter().enumerate() {
            println!(
                "    {}. [tox: {:.2}] r/{} {}",
                i + 1,
                analyzed.classification.score,
                analyzed.item.source_area,
                truncate_chars(&analyzed.item.body, 120).dimmed()
            );
        }
    }
}

pub fn display_outcome(username: &str, outcome: &AnalysisOutcome, top_n: usize) {
    match outcome {
        AnalysisOutcome::Report(report) => display_report(report, top_n),
        AnalysisOutcome::Absent => {
            println!("  No recent activity found for u/{username}.");
        }
        AnalysisOutcome::Failure(reason) => {
            println!("  {} Could not analyze u/{}: {}", "!!".red().bold(), username, reason);
        }
    }
}

pub fn display_alert(alert: &Alert) {
    let message = alert.message();
    match alert {
        Alert::Toxic { report, .. } => {
            println!(
                "\n{} toxic sender on message {} ({})",
                "!!".red().bold(),
                message.id,
                truncate_chars(&message.subject, 60)
            );
            display_report(report, TOP_ALERT_ITEMS);
        }
        Alert::Clean { report, .. } => {
            println!(
                "{} u/{}: no toxic items in {} recent posts",
                "ok".green(),
                report.username,
                report.total_count
            );
        }
        Alert::NoData { username, .. } => {
            println!("{} u/{}: no recent activity", "~".yellow(), username);
        }
        Alert::Failed {
            username, reason, ..
        } => {
            println!("{} u/{}: analysis failed ({})", "!".bright_red(), username, reason);
        }
    }
}

pub fn display_label_counts(counts: &BTreeMap<Label, usize>) {
    let total: usize = counts.values().sum();
    for (label, count) in counts {
        let share = if total > 0 {
            *count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        println!("  {:<10} {:>8}  ({:.1}%)", colorize_label(*label), count, share);
    }
}

pub fn display_batch_summary(summary: &BatchSummary) {
    println!("\n{}", "=== Batch summary ===".bold());
    println!("  Rows in input:     {}", summary.total_rows);
    println!("  Resumed from row:  {}", summary.resumed_from);
    println!("  Processed now:     {}", summary.processed);
    if summary.completed {
        println!("  Status:            {}", "complete".green());
    } else {
        println!(
            "  Status:            {} (run again to resume)",
            "partial".yellow()
        );
    }
    println!("\n  Label counts:");
    display_label_counts(&summary.label_counts);
}

pub fn display_preprocess_stats(stats: &PreprocessStats) {
    println!("\n{}", "=== Preprocessing ===".bold());
    println!("  Input rows:             {}", stats.input_rows);
    println!("  Dropped (missing text): {}", stats.missing_text);
    println!("  Dropped (empty clean):  {}", stats.empty_after_cleaning);
    println!("  Output rows:            {}", stats.output_rows);
    println!(
        "  Mean length:            {:.1} -> {:.1} chars",
        stats.mean_original_length, stats.mean_cleaned_length
    );
}
