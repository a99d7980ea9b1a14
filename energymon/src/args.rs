//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::config::MonitorConfig;

/// Polls an ADE7878A power meter and delivers readings to a collector.
#[derive(Parser, Debug, Clone)]
#[command(name = "energymon")]
#[command(about = "Polls an ADE7878A power meter over I2C and posts readings over HTTP")]
#[command(version)]
pub struct MonitorArgs {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "energymon.json5")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run against a simulated meter and collector.
    #[arg(long)]
    pub simulate: bool,
}

impl MonitorArgs {
    /// Apply command-line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut MonitorConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.simulate {
            config.simulation.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = MonitorArgs::try_parse_from(["energymon"]).unwrap();
        assert_eq!(args.config, PathBuf::from("energymon.json5"));
        assert_eq!(args.log_level, None);
        assert!(!args.simulate);
    }

    #[test]
    fn test_overrides_apply() {
        let args = MonitorArgs::try_parse_from([
            "energymon",
            "-c",
            "/etc/energymon.json5",
            "--log-level",
            "debug",
            "--simulate",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/energymon.json5"));

        let mut config = MonitorConfig::default();
        args.apply(&mut config);
        assert_eq!(config.logging.level, "debug");
        assert!(config.simulation.enabled);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let args = MonitorArgs::try_parse_from(["energymon"]).unwrap();
        let mut config = MonitorConfig::default();
        config.logging.level = "warn".to_string();

        args.apply(&mut config);
        assert_eq!(config.logging.level, "warn");
        assert!(!config.simulation.enabled);
    }
}
