//! Config command handler

use super::CommandContext;
use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};

pub fn run_config(ctx: &CommandContext, args: &ConfigArgs) -> Result<String> {
    match &args.action {
        ConfigAction::Path => Ok(format!("{}\n", ctx.config_path.display())),
        ConfigAction::Show => ctx.load_config()?.to_toml(),
        ConfigAction::Init { force } => {
            if ctx.config_path.exists() && !force {
                return Err(IndexError::ConfigError {
                    message: format!(
                        "{} already exists (use --force to overwrite)",
                        ctx.config_path.display()
                    ),
                });
            }
            IndexConfig::default().save_to(&ctx.config_path)?;
            Ok(format!("wrote {}\n", ctx.config_path.display()))
        }
    }
}
