//! Global subscriber installation

use serde::Deserialize;
use std::sync::Once;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output style of the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Human-readable lines, grove targets at debug
    Development,
    /// One JSON object per event, grove targets at info
    Production,
    /// Bare registry; tests add their own capture layer
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is unset or invalid
    pub fn default_directive(self) -> &'static str {
        match self {
            Profile::Development => "grove=debug",
            Profile::Production | Profile::Test => "grove=info",
        }
    }

    fn env_filter(self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

static INSTALL: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call in a process has an effect. Returns whether this
/// call installed a subscriber; `false` also covers another subscriber
/// having been set elsewhere first.
///
/// # Example
///
/// ```
/// use grove_core::logging_facility::{init, Profile};
///
/// init(Profile::Development);
/// assert!(!init(Profile::Production));
/// ```
pub fn init(profile: Profile) -> bool {
    let mut installed = false;
    INSTALL.call_once(|| {
        installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(profile.env_filter())
                .try_init()
                .is_ok(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(profile.env_filter())
                .try_init()
                .is_ok(),
            Profile::Test => tracing_subscriber::registry().try_init().is_ok(),
        };
    });
    installed
}
