//! Project initialization command

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Initialize a new project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project name / directory
    #[arg(default_value = ".")]
    pub name: String,

    /// Runtime preset (node, nodeless)
    #[arg(short, long, default_value = "node")]
    pub preset: String,

    /// Overwrite an existing bundleplan.toml
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = Path::new(&self.name);

        eprintln!(
            "{} Initializing new {} server project...\n",
            "→".blue(),
            self.preset.cyan()
        );

        // Create project directory if needed
        if self.name != "." {
            fs::create_dir_all(project_dir).context("Failed to create project directory")?;
        }

        let config_path = project_dir.join("bundleplan.toml");
        if config_path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists; use --force to overwrite it",
                config_path.display()
            );
        }

        fs::write(&config_path, self.generate_config())
            .context("Failed to write bundleplan.toml")?;
        eprintln!("  {} Created {}", "✓".green(), "bundleplan.toml".cyan());

        let handler = project_dir.join("src/api/hello.ts");
        if !handler.exists() {
            fs::create_dir_all(project_dir.join("src/api"))?;
            fs::write(&handler, HELLO_HANDLER).context("Failed to write src/api/hello.ts")?;
            eprintln!("  {} Created {}", "✓".green(), "src/api/hello.ts".cyan());
        }

        eprintln!(
            "\n{} Project initialized successfully!\n",
            "✓".green().bold()
        );

        eprintln!("  Next steps:");
        if self.name != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.name.cyan());
        }
        eprintln!("    {} bundleplan plan", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn generate_config(&self) -> String {
        format!(
r#"# bundleplan configuration

plugins = []

[project]
name = "{name}"
src_dir = "src"
build_dir = ".build"
runtime_dir = "runtime"
entry = "runtime/entries/node.mjs"
preset = "{preset}"
node = {node}

[output]
server_dir = ".output/server"
ext = "mjs"

[scan]
api_dir = "api"
routes_dir = "routes"

[externals]
trace = true
inline = []
external = []
"#,
            name = if self.name == "." { "my-server" } else { &self.name },
            preset = self.preset,
            node = self.preset != "nodeless",
        )
    }
}

const HELLO_HANDLER: &str = r#"export default () => ({ hello: 'world' })
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_generated_config_parses() {
        let cmd = InitCommand {
            name: "api".to_string(),
            preset: "nodeless".to_string(),
            force: false,
        };
        let config = Config::from_toml(&cmd.generate_config(), "/proj".into()).unwrap();

        assert_eq!(config.project.name, "api");
        assert!(!config.project.node);
        assert_eq!(config.project.src_dir, "src");
    }
}
