//! Configuration, deserialisable with `serde` from whatever format the host application uses.

use crate::channel::ChannelConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn yes() -> bool {
    true
}

/// Which tables are regenerated per channel.  A table not being rewritten is passed through to
/// every channel unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default = "yes")]
    pub rewrite_pat: bool,
    #[serde(default = "yes")]
    pub rewrite_pmt: bool,
    #[serde(default = "yes")]
    pub rewrite_sdt: bool,
    #[serde(default = "yes")]
    pub rewrite_eit: bool,
    /// Also require a PAT entry's program_number to equal the channel's service_id before it is
    /// kept, rather than only checking the PMT PID
    #[serde(default)]
    pub pat_filter_by_service_id: bool,
}

impl Default for RewriteConfig {
    fn default() -> RewriteConfig {
        RewriteConfig {
            rewrite_pat: true,
            rewrite_pmt: true,
            rewrite_sdt: true,
            rewrite_eit: true,
            pat_filter_by_service_id: false,
        }
    }
}

/// Everything needed to construct [`SiTables`](../tables/struct.SiTables.html).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiConfig {
    #[serde(default)]
    pub rewrite: RewriteConfig,
    pub channels: Vec<ChannelConfig>,
}

impl SiConfig {
    /// Validates each channel, and checks that no two channels share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for channel in &self.channels {
            channel.validate()?;
            if !names.insert(channel.name.as_str()) {
                return Err(ConfigError::DuplicateChannel(channel.name.clone()));
            }
        }
        Ok(())
    }
}
