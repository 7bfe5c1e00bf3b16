//! Channel plan resolution.
//!
//! Turns channel names and operation names into channel indices and resolved
//! [`OpChain`]s. Everything that can be wrong with a configuration surfaces
//! here, before any plane is touched.

use crate::core::channels::ChannelMap;
use crate::core::config::OperationParameters;
use crate::core::error::{ConfigError, ConfigResult, ShapeError};
use crate::filters::operation::OpChain;
use crate::filters::registry::OperationRegistry;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Resolved mapping from channel index to the chain applied to it.
///
/// Every chain in a plan shares the same resize depth, so all channels
/// (processed or passthrough) end up with the same output extent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelPlan {
    chains: BTreeMap<usize, OpChain>,
    passthrough: OpChain,
}

impl ChannelPlan {
    /// Plan with no processed channels.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a plan from per-channel chains.
    ///
    /// Fails with [`ConfigError::MixedResize`] when chains disagree on how
    /// many times they resize. `name_of` labels channels in that error.
    pub fn from_chains<F>(chains: BTreeMap<usize, OpChain>, name_of: F) -> ConfigResult<Self>
    where
        F: Fn(usize) -> String,
    {
        let mut expected: Option<usize> = None;
        let mut passthrough = OpChain::empty();
        for (&channel, chain) in &chains {
            let depth = chain.resize_depth();
            match expected {
                None => {
                    expected = Some(depth);
                    passthrough = chain.resize_only();
                }
                Some(expected) if expected != depth => {
                    return Err(ConfigError::MixedResize {
                        channel: name_of(channel),
                        depth,
                        expected,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(Self {
            chains,
            passthrough,
        })
    }

    /// Chain for a channel, if it is processed.
    pub fn get(&self, channel: usize) -> Option<&OpChain> {
        self.chains.get(&channel)
    }

    /// Whether a channel is processed.
    pub fn contains(&self, channel: usize) -> bool {
        self.chains.contains_key(&channel)
    }

    /// Processed channel indices in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.chains.keys().copied()
    }

    /// Iterate `(channel, chain)` pairs in ascending channel order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &OpChain)> {
        self.chains.iter().map(|(&c, chain)| (c, chain))
    }

    /// Number of processed channels.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether no channel is processed.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Number of resizes every chain performs.
    pub fn resize_depth(&self) -> usize {
        self.passthrough.len()
    }

    /// Chain applied to passthrough channels: the shared resize steps, or
    /// the identity when nothing resizes.
    pub fn passthrough_chain(&self) -> &OpChain {
        &self.passthrough
    }

    /// Output plane extent for an input plane extent.
    pub fn output_extent(&self, extent: (usize, usize)) -> Result<(usize, usize), ShapeError> {
        self.passthrough.output_extent(extent)
    }
}

/// Resolve per-channel operation names into a [`ChannelPlan`].
///
/// Fails on the first channel name missing from `channel_map`, the first
/// operation name missing from `registry`, or a mix of resize depths.
pub fn resolve_plan(
    channel_map: &ChannelMap,
    process_channels: &IndexMap<String, Vec<String>>,
    registry: &OperationRegistry,
    params: &OperationParameters,
) -> ConfigResult<ChannelPlan> {
    let mut chains = BTreeMap::new();
    for (name, ops) in process_channels {
        let index = channel_map
            .index_of(name)
            .ok_or_else(|| ConfigError::UnknownChannel { name: name.clone() })?;
        let chain = registry.resolve_chain(ops.as_slice(), params, &format!("channel '{}'", name))?;
        log::debug!("Channel '{}' (index {}) → {}", name, index, chain);
        chains.insert(index, chain);
    }
    ChannelPlan::from_chains(chains, |index| channel_map.display_name(index))
}

/// Plan applying one chain to every channel in `0..channel_count`.
pub fn resolve_uniform_plan(channel_count: usize, chain: &OpChain) -> ChannelPlan {
    let chains = (0..channel_count).map(|c| (c, chain.clone())).collect();
    ChannelPlan {
        chains,
        passthrough: chain.resize_only(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::operation::Operation;

    fn setup() -> (ChannelMap, OperationRegistry, OperationParameters) {
        (
            ChannelMap::from_names(["dapi", "gfp", "rfp"]).unwrap(),
            OperationRegistry::with_builtins(),
            OperationParameters {
                tile_resize_factor: 2,
                ..OperationParameters::default()
            },
        )
    }

    fn channels(entries: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(name, ops)| (name.to_string(), ops.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_resolve_per_channel_chains() {
        let (map, registry, params) = setup();
        let plan = resolve_plan(
            &map,
            &channels(&[("rfp", &["stretch"]), ("dapi", &["ball", "blur"])]),
            &registry,
            &params,
        )
        .unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.channels().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(plan.get(0).unwrap().names(), vec!["ball", "blur"]);
        assert_eq!(plan.get(2).unwrap().names(), vec!["stretch"]);
        assert!(!plan.contains(1));
        assert_eq!(plan.resize_depth(), 0);
        assert!(plan.passthrough_chain().is_empty());
    }

    #[test]
    fn test_unknown_channel_fails() {
        let (map, registry, params) = setup();
        let err = resolve_plan(
            &map,
            &channels(&[("dapi", &["blur"]), ("cy5", &["blur"])]),
            &registry,
            &params,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownChannel {
                name: "cy5".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_operation_fails() {
        let (map, registry, params) = setup();
        let err = resolve_plan(
            &map,
            &channels(&[("gfp", &["blur", "sharpen"])]),
            &registry,
            &params,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownOperation { ref name, ref context }
                if name == "sharpen" && context.contains("gfp")
        ));
    }

    #[test]
    fn test_mixed_resize_rejected() {
        let (map, registry, params) = setup();
        let err = resolve_plan(
            &map,
            &channels(&[("dapi", &["blur", "resize"]), ("gfp", &["blur"])]),
            &registry,
            &params,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MixedResize {
                channel: "gfp".to_string(),
                depth: 0,
                expected: 1
            }
        );
    }

    #[test]
    fn test_uniform_resize_sets_passthrough() {
        let (map, registry, params) = setup();
        let plan = resolve_plan(
            &map,
            &channels(&[("dapi", &["resize", "blur"]), ("gfp", &["stretch", "resize"])]),
            &registry,
            &params,
        )
        .unwrap();
        assert_eq!(plan.resize_depth(), 1);
        assert_eq!(
            plan.passthrough_chain().ops(),
            &[Operation::Resize { factor: 2 }]
        );
        assert_eq!(plan.output_extent((100, 64)).unwrap(), (50, 32));
    }

    #[test]
    fn test_uniform_plan() {
        let chain = OpChain::new(vec![Operation::Stretch {
            percentiles: (1.0, 99.0),
        }]);
        let plan = resolve_uniform_plan(3, &chain);
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|(_, c)| *c == chain));
        assert_eq!(plan.output_extent((10, 10)).unwrap(), (10, 10));
    }
}
