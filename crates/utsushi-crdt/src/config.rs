//! Runtime policy for the lossy corners of the value model.
//!
//! ```ron
//! (
//!     unrepresentable: Reject,
//!     list_growth: Ignore,
//!     annotate: true,
//! )
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use serde::Deserialize;

use crate::{CrdtError, Result};

/// What to do with a host value that has no scalar representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum FallbackPolicy {
    /// Store the host string form. Round-trips lose the original type.
    #[default]
    Stringify,
    /// Fail with [`CrdtError::Unrepresentable`].
    Reject,
}

/// What to do when a list length assignment would grow the list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum GrowthPolicy {
    /// Fail with [`CrdtError::ListGrowth`].
    #[default]
    Reject,
    /// Leave the list unchanged.
    Ignore,
}

/// Document facade configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub unrepresentable: FallbackPolicy,
    pub list_growth: GrowthPolicy,
    /// Attach [`utsushi_types::NodeMeta`] to materialized arrays and objects.
    pub annotate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unrepresentable: FallbackPolicy::default(),
            list_growth: GrowthPolicy::default(),
            annotate: true,
        }
    }
}

impl Config {
    /// Parse from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| CrdtError::Config(e.to_string()))
    }
}
