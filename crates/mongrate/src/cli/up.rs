use anyhow::Result;
use console::style;

use mongrate::prelude::*;

/// Apply every pending migration.
pub async fn execute(deps: &RunnerDependencies) -> Result<()> {
    println!();
    println!(
        "  {}  {} Migrations",
        style("⚒️").bold(),
        style("MONGRATE").bold().cyan()
    );
    println!();

    println!(
        "  {} Running migrations from {}...",
        style("→").dim(),
        deps.config.migrations.dir.display()
    );
    let report = MigrationRunner::new(deps).run().await?;

    for pair in &report.executed {
        println!(
            "    {} {} {} {}",
            style("✓").green(),
            style(&pair.unit).cyan(),
            style("on").dim(),
            pair.database
        );
    }

    println!();
    println!(
        "  {} {} executed, {} already applied",
        style("ℹ").blue(),
        report.executed.len(),
        report.skipped.len()
    );
    println!();
    Ok(())
}
