use colored::Colorize;

use agenteval_core::{AggregateReport, BatchOutcome, GroupStats};

pub fn print_report(report: &AggregateReport) {
    println!("{}", "=== Criteria Report ===".bright_blue().bold());
    println!("{}  {}", "Records:".dimmed(), report.records);

    for criterion in &report.criteria {
        println!();
        println!("{}", criterion.name.bold());
        let scale = criterion
            .accepted_values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}={}", i, v))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {}  {}", "Scale:".dimmed(), scale);
        print_group("Succeeded", criterion.success.as_ref());
        print_group("Failed", criterion.failure.as_ref());
    }
}

fn print_group(label: &str, stats: Option<&GroupStats>) {
    match stats {
        Some(s) => println!(
            "  {:<10} n={:<4} mean={:.2}  95% CI [{:.2}, {:.2}]  {:?}",
            label, s.count, s.mean, s.ci_low, s.ci_high, s.distribution
        ),
        None => println!("  {:<10} {}", label, "no records".dimmed()),
    }
}

pub fn print_batch_summary(outcome: &BatchOutcome) {
    eprintln!();
    let banner = if outcome.interrupted {
        "=== INTERRUPTED ===".bright_yellow()
    } else if outcome.failures.is_empty() {
        "=== SCORED ===".bright_green()
    } else {
        "=== PARTIAL ===".bright_red()
    };
    eprintln!("{}", banner.bold());
    eprintln!("{}  {}", "Scored:".dimmed(), outcome.scored.len());
    eprintln!("{}  {}", "Failed:".dimmed(), outcome.failures.len());
    if !outcome.abandoned.is_empty() {
        eprintln!("{}  {}", "Abandoned:".dimmed(), outcome.abandoned.len());
    }
    eprintln!(
        "{}  {:.1}s",
        "Duration:".dimmed(),
        outcome.total_duration_secs
    );

    for (id, reason) in &outcome.failures {
        eprintln!("  {} {}: {}", "✗".bright_red(), id, reason);
    }
}
