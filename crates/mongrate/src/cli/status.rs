use anyhow::Result;
use console::style;

use mongrate::prelude::*;

/// Show which migrations are applied to which databases.
pub async fn execute(deps: &RunnerDependencies) -> Result<()> {
    println!();
    println!(
        "  {}  {} Migration Status",
        style("⚒️").bold(),
        style("MONGRATE").bold().cyan()
    );
    println!();

    let statuses = MigrationRunner::new(deps).status().await?;

    if statuses.is_empty() {
        println!(
            "  {} No migrations found in {}",
            style("ℹ").blue(),
            deps.config.migrations.dir.display()
        );
        return Ok(());
    }

    for unit in &statuses {
        let marker = if unit.pending().next().is_none() {
            style("✓").green()
        } else {
            style("○").yellow()
        };
        match &unit.description {
            Some(description) => println!(
                "  {} {} {}",
                marker,
                style(&unit.name).cyan(),
                style(description).dim()
            ),
            None => println!("  {} {}", marker, style(&unit.name).cyan()),
        }

        if unit.targets.is_empty() {
            println!("    {} no target databases", style("-").dim());
        }
        for target in &unit.targets {
            match (target.applied, target.executed_at) {
                (true, Some(at)) => println!(
                    "    {} {} {} ({})",
                    style("✓").green(),
                    target.database,
                    style("at").dim(),
                    at.format("%Y-%m-%d %H:%M:%S")
                ),
                (true, None) => println!(
                    "    {} {} {}",
                    style("✓").green(),
                    target.database,
                    style("(time not recorded)").dim()
                ),
                (false, _) => println!(
                    "    {} {}",
                    style("→").dim(),
                    style(&target.database).yellow()
                ),
            }
        }
    }

    let (applied, pending) = totals(&statuses);
    println!();
    println!(
        "  {} {} applied, {} pending",
        style("ℹ").blue(),
        applied,
        pending
    );
    println!();
    Ok(())
}

/// Applied and pending (unit, database) pair counts.
fn totals(statuses: &[UnitStatus]) -> (usize, usize) {
    statuses.iter().fold((0, 0), |(applied, pending), unit| {
        (
            applied + unit.applied().count(),
            pending + unit.pending().count(),
        )
    })
}
