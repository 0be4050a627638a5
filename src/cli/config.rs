//! Config command handlers.

use anyhow::{Context, Result};

use aptoclaw::config::validate::{validate_config, DiagnosticLevel};
use aptoclaw::config::Config;

use super::ConfigAction;

pub(crate) async fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = Config::path();
            if path.exists() && !force {
                println!("Config already exists at {}", path.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }
            Config::default()
                .save_to_path(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
            println!("Set channels.telegram.token and providers.openai.api_key, or export");
            println!("TELEGRAM_BOT_TOKEN and OPENAI_API_KEY.");
        }
        ConfigAction::Path => {
            println!("{}", Config::path().display());
        }
        ConfigAction::Check => {
            let config_path = Config::path();
            println!("Config file: {}", config_path.display());
            if !config_path.exists() {
                println!("[OK] No config file found (using defaults and environment)");
            }

            let config = match Config::load() {
                Ok(c) => c,
                Err(e) => {
                    println!("[ERROR] {}", e);
                    return Ok(());
                }
            };

            let diagnostics = validate_config(&config);
            for diag in &diagnostics {
                println!("{}", diag);
            }

            let errors = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Error)
                .count();
            let warnings = diagnostics
                .iter()
                .filter(|d| d.level == DiagnosticLevel::Warn)
                .count();

            if errors == 0 && warnings == 0 {
                println!("\nConfiguration looks good!");
            } else {
                println!("\nFound {} error(s), {} warning(s)", errors, warnings);
            }
        }
    }
    Ok(())
}
