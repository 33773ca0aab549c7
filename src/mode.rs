//! Serving mode selection.

use crate::config::ServerConfig;
use std::fmt;

/// How the server runs for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingMode {
    /// Blocking server, no debug or watch features.
    Plain,
    /// Debug diagnostics and template auto-reload, no watching.
    Debug,
    /// `Debug` plus the profiling layer.
    Profile,
    /// File watching with reload and browser refresh.
    LiveReload,
}

impl ServingMode {
    /// Select the mode from normalized config flags.
    ///
    /// `Plain` is never selected here: it is the runtime fallback of
    /// `LiveReload` when no source can be watched.
    pub const fn select(config: &ServerConfig) -> Self {
        match (config.debug, config.profile) {
            (false, _) => Self::LiveReload,
            (true, false) => Self::Debug,
            (true, true) => Self::Profile,
        }
    }

    /// Debug diagnostics: verbose logging, template auto-reload and error
    /// detail in responses.
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug | Self::Profile)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Debug => "debug",
            Self::Profile => "profile",
            Self::LiveReload => "live-reload",
        }
    }
}

impl fmt::Display for ServingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
