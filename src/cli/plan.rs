//! Plan command implementation

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::config::Config;
use crate::plan::{BuildPlan, PlanAssembler};
use crate::utils::{format_duration, relative_path};

/// Assemble the build plan
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Print the plan as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the plan as JSON to a file
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Plan a development build
    #[arg(long)]
    pub dev: bool,
}

impl PlanCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path);
        let mut config = Config::load(config_path)?;
        if self.dev {
            config.project.dev = true;
        }

        eprintln!("{} Assembling build plan...", "→".blue());

        let assembled = PlanAssembler::new(config)?.assemble()?;
        let plan = &assembled.plan;

        eprintln!(
            "\n{} Planned {} in {}\n",
            "✓".green().bold(),
            plan.name.cyan(),
            format_duration(start.elapsed())
        );

        print_summary(plan);

        if self.json || self.out.is_some() {
            let json = serde_json::to_string_pretty(plan).context("Failed to serialize build plan")?;

            if let Some(out) = &self.out {
                fs::write(out, &json)
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                eprintln!("  {} Wrote {}", "✓".green(), out.display().to_string().cyan());
            }

            if self.json {
                println!("{}", json);
            }
        }

        eprintln!();

        Ok(())
    }
}

fn print_summary(plan: &BuildPlan) {
    eprintln!("  {} {}", "input".dimmed(), plan.input.cyan());
    eprintln!(
        "  {} {}/{}",
        "output".dimmed(),
        plan.output.dir.cyan(),
        plan.output.entry_file_names
    );
    eprintln!("  {} {}", "externals".dimmed(), format!("{:?}", plan.externals.mode).to_lowercase());

    let stages = plan
        .stages
        .iter()
        .map(|s| if s.core { s.name.bold().to_string() } else { s.name.clone() })
        .collect::<Vec<_>>()
        .join(" → ");
    eprintln!("  {} {}", "stages".dimmed(), stages);

    if !plan.handlers.is_empty() {
        eprintln!("\n  Handlers:");
        for handler in &plan.handlers {
            let method = handler.method.as_deref().unwrap_or("*");
            let path = relative_path(Path::new(&plan.roots.root_dir), Path::new(&handler.handler))
                .unwrap_or_else(|| handler.handler.clone());
            eprintln!(
                "  {} {} {} {}",
                "•".dimmed(),
                method.to_uppercase().yellow(),
                handler.route.cyan(),
                path.dimmed()
            );
        }
    }

    if !plan.plugins.is_empty() {
        eprintln!("\n  Plugins:");
        for (binding, path) in &plan.plugins {
            eprintln!("  {} {} {}", "•".dimmed(), path.cyan(), binding.dimmed());
        }
    }

    eprintln!("\n  Virtual modules:");
    for id in &plan.virtual_modules {
        eprintln!("  {} {}", "•".dimmed(), id.cyan());
    }

    for warning in &plan.warnings {
        eprintln!("  {} {}", "!".yellow().bold(), warning);
    }
}
