//! Platform configuration
//!
//! A `Config` is an ordered mapping of string option names to string
//! values. It is passed opaquely through `create`/`open` to the storage
//! engine; this layer interprets nothing except the read batch sizing
//! default used by the in-memory engine.

use std::collections::BTreeMap;

/// String-keyed engine tuning options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    options: BTreeMap<String, String>,
}

/// Config key for the default number of cells per read chunk
pub const READ_BATCH_CELLS_KEY: &str = "snda.read_batch_cells";

/// Default number of cells per read chunk when neither the config nor a
/// `reset` hint says otherwise
pub const DEFAULT_READ_BATCH_CELLS: usize = 65_536;

impl Config {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, builder style
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set an option in place
    pub fn set(&mut self, key: &str, value: &str) {
        self.options.insert(key.into(), value.into());
    }

    /// Get an option value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Get an option parsed as usize; unparsable values read as absent
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Cells per read chunk configured here, or the built-in default
    pub fn read_batch_cells(&self) -> usize {
        self.get_usize(READ_BATCH_CELLS_KEY)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_READ_BATCH_CELLS)
    }

    /// Iterate options in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
