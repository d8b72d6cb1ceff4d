use eyre::Result;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    layer::Layered,
    prelude::*,
    Layer, Registry,
};

/// Logging level. A "higher level" means more will be logged.
#[derive(Default, Debug, Clone, Copy, serde::Deserialize, PartialOrd, Ord, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    /// Off
    Off = 0,
    /// Error
    Error = 1,
    /// Warn
    Warn = 2,
    /// Debug
    Debug = 4,
    /// Trace
    Trace = 5,
    /// Info
    #[serde(other)]
    #[default]
    Info = 3,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> LevelFilter {
        match level {
            Level::Off => LevelFilter::OFF,
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
            Level::Info => LevelFilter::INFO,
        }
    }
}

/// Output format of the log lines
#[derive(Default, Debug, Clone, Copy, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Style {
    /// Multi-line, human oriented
    Pretty,
    /// One JSON object per line
    Json,
    /// Single line, abbreviated
    Compact,
    /// Single line, every field
    #[serde(other)]
    #[default]
    Full,
}

type Filtered = Layered<Targets, Registry>;

impl Style {
    fn layer(self) -> Box<dyn Layer<Filtered> + Send + Sync> {
        let layer = tracing_subscriber::fmt::layer();
        match self {
            Style::Pretty => layer.pretty().boxed(),
            Style::Json => layer.json().boxed(),
            Style::Compact => layer.compact().boxed(),
            Style::Full => layer.boxed(),
        }
    }
}

/// Configuration for the tracing subscribers used by surge agents
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    pub(crate) fmt: Style,
    #[serde(default)]
    pub(crate) level: Level,
}

impl TracingConfig {
    /// Create a config with an explicit style and level
    pub fn new(fmt: Style, level: Level) -> Self {
        Self { fmt, level }
    }

    /// The configured level
    pub fn level(&self) -> Level {
        self.level
    }

    fn targets(&self) -> Targets {
        let mut targets = Targets::new().with_default(self.level);
        if self.level < Level::Trace {
            // only show these debug and trace logs at trace level
            targets = targets.with_target("hyper", Level::Info);
            targets = targets.with_target("reqwest", Level::Info);
            targets = targets.with_target("tungstenite", Level::Info);
            targets = targets.with_target("ethers_providers", Level::Info);

            // only show sqlx query logs at trace level
            targets = targets.with_target("sqlx::query", Level::Warn);
            targets = targets.with_target("sea_orm_migration", Level::Warn);
        }
        targets
    }

    /// Attempt to instantiate and register a tracing subscriber setup from
    /// settings.
    pub fn start_tracing(&self) -> Result<()> {
        let subscriber = Registry::default()
            .with(self.targets())
            .with(self.fmt.layer())
            .with(tracing_error::ErrorLayer::default());

        subscriber.try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_by_verbosity() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let config: TracingConfig =
            serde_json::from_str(r#"{"fmt": "sparkly", "level": "loud"}"#).unwrap();
        assert_eq!(config.fmt, Style::Full);
        assert_eq!(config.level, Level::Info);
    }

    #[test]
    fn noisy_targets_are_capped_below_trace() {
        let config = TracingConfig::new(Style::Compact, Level::Debug);
        let targets = config.targets();
        assert!(!targets.would_enable("sqlx::query", &tracing::Level::INFO));
        assert!(targets.would_enable("submitter", &tracing::Level::DEBUG));

        let config = TracingConfig::new(Style::Compact, Level::Trace);
        assert!(config
            .targets()
            .would_enable("sqlx::query", &tracing::Level::TRACE));
    }
}
