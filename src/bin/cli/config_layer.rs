//! Configuration Layer Management
//!
//! Defaults, an optional configuration file and CLI overrides are merged in
//! that order, the later layer taking priority.

use std::path::Path;

use anyhow::Context;
use subdiff::SubdiffConfig;

use crate::cli::args::RunArgs;

/// Apply CLI overrides on top of a configuration
pub trait ApplyCliArgs<T> {
    /// Overwrite every setting the arguments specify
    fn apply_cli_args(&mut self, args: &T);
}

impl ApplyCliArgs<RunArgs> for SubdiffConfig {
    fn apply_cli_args(&mut self, args: &RunArgs) {
        if let Some(strategy) = args.strategy {
            self.similarity.strategy = strategy.into();
        }
        if let Some(facility) = args.facility {
            self.similarity.facility = facility.into();
        }
        if let Some(command) = &args.sim_command {
            self.similarity.command = command.clone();
        }
        if let Some(timeout) = args.timeout {
            self.similarity.timeout_seconds = timeout;
        }
        if let Some(templates) = &args.templates {
            self.report.templates_dir = Some(templates.clone());
        }
    }
}

/// Load a configuration file, or the defaults when no path is given
pub fn load_configuration(config_path: Option<&Path>) -> anyhow::Result<SubdiffConfig> {
    let config = match config_path {
        Some(path) => SubdiffConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SubdiffConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Build the effective configuration for `subdiff run`
pub fn build_run_config(args: &RunArgs) -> anyhow::Result<SubdiffConfig> {
    let mut config = load_configuration(args.config.as_deref())?;
    config.apply_cli_args(args);
    config.validate()?;
    Ok(config)
}
