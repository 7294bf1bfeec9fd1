pub mod error;
pub mod fetcher;
pub mod filter;
pub mod merger;
pub mod proxy;
pub mod resolver;
pub mod site;
pub mod template;
pub mod utils;

use std::{fmt::Display, str::FromStr};

pub use merger::{MergedDocument, MergedResult, Merger, SourcesConfig};
pub use proxy::ProxyNode;
pub use site::{Site, SiteConfig};

/// How much the pipeline reports while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Only the final summary line.
    Quiet,
    /// Per-site events and dropped nodes.
    #[default]
    Normal,
    /// Everything, down to per-node decisions.
    Verbose,
}

impl Verbosity {
    pub const NAMES: [&'static str; 3] = ["quiet", "normal", "verbose"];

    #[cfg(feature = "log")]
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            Self::Quiet => log::LevelFilter::Off,
            Self::Normal => log::LevelFilter::Info,
            Self::Verbose => log::LevelFilter::Debug,
        }
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quiet" => Ok(Self::Quiet),
            "normal" => Ok(Self::Normal),
            "verbose" => Ok(Self::Verbose),
            other => Err(format!(
                "unknown verbosity '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

impl Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Quiet => Self::NAMES[0],
            Self::Normal => Self::NAMES[1],
            Self::Verbose => Self::NAMES[2],
        };
        write!(f, "{}", name)
    }
}

/// Initializes the logging system for the application.
///
/// This function configures the logging system with the specified verbosity level.
///
/// # Arguments
///
/// * `log_level`: The desired verbosity level for logging. Determines which log messages will be displayed.
///
/// # Returns
///
/// A result indicating the success or failure of the logging setup.
#[cfg(feature = "log")]
pub fn initialize_logging(log_level: log::LevelFilter) -> anyhow::Result<()> {
    stderrlog::new()
        .module(module_path!()) // Configures the module path for log messages.
        .show_module_names(false)
        .verbosity(log_level) // Sets the specified log verbosity level.
        .init()?; // Initializes the logger.
    Ok(())
}

/// Loads a sources document and runs the whole pipeline over it.
///
/// Only a broken sources document is an error; unreachable sites and bad
/// nodes are logged and skipped.
pub async fn merge_sources(sources: &std::path::Path) -> Result<MergedResult, error::ConfigError> {
    let config = SourcesConfig::load(sources)?;

    #[cfg(feature = "log")]
    log::debug!("Loaded {} sources from {}", config.sources.len(), sources.display());

    let merger = Merger::from_config(&config);
    let merged = merger.run(config.sources).await;

    #[cfg(feature = "log")]
    for report in &merged.reports {
        log::info!("{}", report);
    }
    Ok(merged)
}
