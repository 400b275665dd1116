//! Explain command implementation

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::plan::PlanAssembler;
use crate::plugins::ResolvedModule;

/// Resolve import specifiers through the plan's pipeline
#[derive(Args, Debug)]
pub struct ExplainCommand {
    /// Import specifiers to resolve
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Module the imports are resolved from
    #[arg(short, long)]
    pub importer: Option<String>,

    /// Print results as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Print the traced external package manifest after resolving
    #[arg(long)]
    pub manifest: bool,
}

#[derive(Debug, Serialize)]
struct Explanation {
    #[serde(flatten)]
    module: Option<ResolvedModule>,
    request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk: Option<String>,
}

impl ExplainCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;
        let pipeline = PlanAssembler::new(config)?.assemble()?.pipeline;

        let mut explanations = Vec::new();
        for id in &self.ids {
            let module = pipeline
                .resolve_id(id, self.importer.as_deref())
                .await
                .with_context(|| format!("Failed to resolve {}", id))?;

            let chunk = module
                .as_ref()
                .filter(|m| !m.external)
                .map(|m| pipeline.chunk_file_name(std::slice::from_ref(&m.id)));

            explanations.push(Explanation {
                module,
                request: id.clone(),
                chunk,
            });
        }

        pipeline.run_build_end().await?;

        if self.json {
            let json = serde_json::to_string_pretty(&explanations).context("Failed to serialize results")?;
            println!("{}", json);
        } else {
            for explanation in &explanations {
                print_explanation(explanation);
            }
        }

        if self.manifest {
            if let Some(traced) = pipeline.traced_packages() {
                let manifest = serde_json::to_string_pretty(&traced.manifest())?;
                println!("{}", manifest);
            }
        }

        for warning in pipeline.warnings() {
            eprintln!("  {} {}", "!".yellow().bold(), warning);
        }

        Ok(())
    }
}

fn print_explanation(explanation: &Explanation) {
    match &explanation.module {
        Some(module) if module.external => eprintln!(
            "  {} {} {} {}",
            "•".dimmed(),
            explanation.request.cyan(),
            "external".yellow(),
            module.id
        ),
        Some(module) => eprintln!(
            "  {} {} {} {} {}",
            "•".dimmed(),
            explanation.request.cyan(),
            "inline".green(),
            module.id.escape_default(),
            explanation.chunk.as_deref().unwrap_or_default().dimmed()
        ),
        None => eprintln!(
            "  {} {} {}",
            "•".dimmed(),
            explanation.request.cyan(),
            "unresolved".red()
        ),
    }
}
