//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "job-timer")]
#[command(about = "Job step and billable-time tracking service")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding one snapshot file per job
    #[arg(short, long, default_value = "./job-timer-data")]
    pub data_dir: PathBuf,

    /// Keep snapshots in memory only (nothing survives a restart)
    #[arg(long)]
    pub memory_store: bool,

    /// Append analytics events as JSON lines to this file
    #[arg(long)]
    pub analytics_log: Option<PathBuf>,

    /// Capacity of the analytics event channel
    #[arg(long, default_value = "256")]
    pub analytics_buffer: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_arguments() {
        let config = Config::try_parse_from(["job-timer"]).unwrap();
        assert_eq!(config.port, 20554);
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
        assert!(!config.memory_store);
        assert!(config.analytics_log.is_none());
    }

    #[test]
    fn verbose_switches_log_level() {
        let config = Config::try_parse_from(["job-timer", "-v", "--port", "9000"]).unwrap();
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.port, 9000);
    }
}
