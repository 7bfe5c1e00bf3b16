//! Channel metadata: an ordered name → index mapping.

use crate::core::error::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered mapping from channel name to tensor channel index.
///
/// Indices are dense (`0..C`) and unique. Created once from scene metadata
/// and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, usize>", into = "IndexMap<String, usize>")]
pub struct ChannelMap {
    channels: IndexMap<String, usize>,
}

impl ChannelMap {
    /// Create a channel map, checking that indices are dense and unique.
    pub fn new(channels: IndexMap<String, usize>) -> ConfigResult<Self> {
        let count = channels.len();
        let mut seen = vec![false; count];
        for (name, &index) in &channels {
            if index >= count {
                return Err(ConfigError::InvalidChannelMap(format!(
                    "channel '{}' has index {} but only {} channels exist",
                    name, index, count
                )));
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(ConfigError::InvalidChannelMap(format!(
                    "index {} is assigned to more than one channel",
                    index
                )));
            }
        }
        Ok(Self { channels })
    }

    /// Create a map whose indices follow the order of `names`.
    pub fn from_names<I, S>(names: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut channels = IndexMap::new();
        for (index, name) in names.into_iter().enumerate() {
            let name = name.into();
            if channels.insert(name.clone(), index).is_some() {
                return Err(ConfigError::InvalidChannelMap(format!(
                    "channel '{}' is listed twice",
                    name
                )));
            }
        }
        Self::new(channels)
    }

    /// Index of a channel name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.channels.get(name).copied()
    }

    /// Name of a channel index.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.channels
            .iter()
            .find(|(_, i)| **i == index)
            .map(|(name, _)| name.as_str())
    }

    /// Name of a channel index, or a placeholder for unnamed indices.
    pub fn display_name(&self, index: usize) -> String {
        self.name_of(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", index))
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterate `(name, index)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.channels.iter().map(|(name, &index)| (name.as_str(), index))
    }

    /// Channel names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

impl TryFrom<IndexMap<String, usize>> for ChannelMap {
    type Error = ConfigError;

    fn try_from(channels: IndexMap<String, usize>) -> Result<Self, Self::Error> {
        Self::new(channels)
    }
}

impl From<ChannelMap> for IndexMap<String, usize> {
    fn from(map: ChannelMap) -> Self {
        map.channels
    }
}
