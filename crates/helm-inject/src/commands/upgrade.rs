//! Upgrade command - render, inject, then upgrade a release

use console::style;
use helm_inject_core::{Pipeline, PipelineConfig};

use crate::error::Result;

/// Run the upgrade command
pub fn run(config: PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let config = pipeline.config();
    tracing::debug!(?config, "pipeline configuration");

    eprintln!(
        "{} Upgrading release {} from {} with {} {}",
        style("→").blue().bold(),
        style(&config.release).cyan(),
        style(&config.chart).cyan(),
        style(&config.injector).yellow(),
        config.inject_command
    );

    let result = pipeline.run()?;

    println!("{}", result.output.trim_end());

    if let Some(path) = &result.kept_workspace {
        eprintln!(
            "{} Workspace kept at {}",
            style("✓").green().bold(),
            style(path.display()).dim()
        );
    }

    Ok(())
}
