use tracing_subscriber::filter::LevelFilter;

/// Verbosity levels exposed on the CLI surface, coarser than `tracing`'s
/// five levels since operators reach for one of a handful of settings, not
/// a bespoke filter string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and above; the default.
    #[default]
    Normal,
    /// Per-connection and per-file progress.
    Verbose,
    /// Per-block tracing, including throttler and queue internals.
    Debug,
}

impl Verbosity {
    /// Builds the level this verbosity maps to for the crate's own log
    /// lines, absent any `RUST_LOG` override.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::Debug => LevelFilter::TRACE,
        }
    }

    /// Parses a `-v`-style repeat count into a verbosity level, clamping at
    /// [`Verbosity::Debug`].
    #[must_use]
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }
}
