//! Eager configuration checks.
//!
//! Each check looks at one category of problem and reports every instance
//! it finds, so a single validation pass can list all configuration mistakes
//! at once instead of stopping at the first.

use crate::core::channels::ChannelMap;
use crate::core::config::PipelineConfig;
use crate::core::error::{ConfigError, ValidationReport, ValidationWarning};
use crate::filters::registry::OperationRegistry;
use std::time::Instant;

/// Everything a check may inspect.
pub struct PlanContext<'a> {
    /// Run configuration.
    pub config: &'a PipelineConfig,
    /// Channel metadata of the scene.
    pub channel_map: &'a ChannelMap,
    /// Registry operation names resolve against.
    pub registry: &'a OperationRegistry,
    /// Tile count of the scene, when known.
    pub tiles: Option<usize>,
}

impl<'a> PlanContext<'a> {
    /// Create a context without scene shape information.
    pub fn new(
        config: &'a PipelineConfig,
        channel_map: &'a ChannelMap,
        registry: &'a OperationRegistry,
    ) -> Self {
        Self {
            config,
            channel_map,
            registry,
            tiles: None,
        }
    }

    /// Set the scene's tile count.
    pub fn with_tiles(mut self, tiles: usize) -> Self {
        self.tiles = Some(tiles);
        self
    }
}

/// Trait for plan checks.
pub trait PlanCheck: Send + Sync {
    /// Name of this check.
    fn name(&self) -> &str;

    /// Run the check.
    ///
    /// Returns Ok with warnings, or Err with errors.
    fn check(&self, ctx: &PlanContext<'_>) -> Result<Vec<ValidationWarning>, Vec<ConfigError>>;
}

fn finish(
    warnings: Vec<ValidationWarning>,
    errors: Vec<ConfigError>,
) -> Result<Vec<ValidationWarning>, Vec<ConfigError>> {
    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(errors)
    }
}

/// Scalar parameter ranges.
pub struct ParameterCheck;

impl PlanCheck for ParameterCheck {
    fn name(&self) -> &str {
        "Parameter Check"
    }

    fn check(&self, ctx: &PlanContext<'_>) -> Result<Vec<ValidationWarning>, Vec<ConfigError>> {
        finish(Vec::new(), ctx.config.issues())
    }
}

/// Channel names exist in the channel map.
pub struct ChannelCheck;

impl PlanCheck for ChannelCheck {
    fn name(&self) -> &str {
        "Channel Check"
    }

    fn check(&self, ctx: &PlanContext<'_>) -> Result<Vec<ValidationWarning>, Vec<ConfigError>> {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if ctx.config.process_channels.is_empty() {
            warnings.push(ValidationWarning {
                message: "No channels are configured for tile processing".to_string(),
                suggestion: Some(
                    "Add entries to process_channels, or rely on stitching alone".to_string(),
                ),
            });
        }

        for (name, ops) in &ctx.config.process_channels {
            if ctx.channel_map.index_of(name).is_none() {
                errors.push(ConfigError::UnknownChannel { name: name.clone() });
            } else if ops.is_empty() {
                warnings.push(ValidationWarning {
                    message: format!("Channel '{}' has an empty chain and is copied unchanged", name),
                    suggestion: None,
                });
            }
        }

        finish(warnings, errors)
    }
}

/// Operation names resolve in the registry.
pub struct OperationCheck;

impl PlanCheck for OperationCheck {
    fn name(&self) -> &str {
        "Operation Check"
    }

    fn check(&self, ctx: &PlanContext<'_>) -> Result<Vec<ValidationWarning>, Vec<ConfigError>> {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let lists = ctx
            .config
            .process_channels
            .iter()
            .map(|(name, ops)| (format!("channel '{}'", name), ops))
            .chain(std::iter::once((
                "stitch_processing".to_string(),
                &ctx.config.stitch_processing,
            )));

        for (context, ops) in lists {
            for op in ops {
                if let Err(err) = ctx.registry.resolve_kind(op) {
                    errors.push(match err {
                        ConfigError::UnknownOperation { name, .. } => {
                            ConfigError::UnknownOperation {
                                name,
                                context: context.clone(),
                            }
                        }
                        other => other,
                    });
                }
            }
        }

        if !ctx.config.stitch_processing.is_empty() && ctx.config.grid_shape.is_none() {
            warnings.push(ValidationWarning {
                message: "stitch_processing is set but no grid_shape is given; it will not run"
                    .to_string(),
                suggestion: Some("Set grid_shape to enable stitching".to_string()),
            });
        }

        finish(warnings, errors)
    }
}

/// Grid shape matches the scene's tile count.
pub struct GridCheck;

impl PlanCheck for GridCheck {
    fn name(&self) -> &str {
        "Grid Check"
    }

    fn check(&self, ctx: &PlanContext<'_>) -> Result<Vec<ValidationWarning>, Vec<ConfigError>> {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        match (ctx.config.grid_shape, ctx.tiles) {
            (Some(grid), Some(tiles)) if grid.tile_count() != tiles => {
                errors.push(ConfigError::GridShapeMismatch { grid, tiles });
            }
            (None, _) if ctx.config.quilt_resize_factor > 1 || ctx.config.rescale_on_stitch => {
                warnings.push(ValidationWarning {
                    message: "Stitch options are set but no grid_shape is given".to_string(),
                    suggestion: Some("Set grid_shape to enable stitching".to_string()),
                });
            }
            _ => {}
        }

        finish(warnings, errors)
    }
}

/// Resize chains are uniform across processed channels.
pub struct ResizeCheck;

impl PlanCheck for ResizeCheck {
    fn name(&self) -> &str {
        "Resize Check"
    }

    fn check(&self, ctx: &PlanContext<'_>) -> Result<Vec<ValidationWarning>, Vec<ConfigError>> {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let resize_name = crate::filters::operation::OperationKind::Resize.name();
        let mut expected: Option<(usize, &str)> = None;
        let mut uses_resize = false;

        for (name, ops) in &ctx.config.process_channels {
            let count = ops
                .iter()
                .filter(|op| ctx.registry.canonical_name(op) == Some(resize_name))
                .count();
            uses_resize |= count > 0;
            // A unit factor leaves extents unchanged.
            let depth = if ctx.config.parameters.tile_resize_factor > 1 { count } else { 0 };
            match expected {
                None => expected = Some((depth, name.as_str())),
                Some((first, _)) if first != depth => {
                    errors.push(ConfigError::MixedResize {
                        channel: name.clone(),
                        depth,
                        expected: first,
                    });
                }
                Some(_) => {}
            }
        }

        if uses_resize && ctx.config.parameters.tile_resize_factor == 1 {
            warnings.push(ValidationWarning {
                message: "'resize' is configured but tile_resize_factor is 1".to_string(),
                suggestion: Some("Set tile_resize_factor above 1 or drop 'resize'".to_string()),
            });
        }

        finish(warnings, errors)
    }
}

/// Runs a series of checks and collects a [`ValidationReport`].
pub struct PlanValidator {
    checks: Vec<Box<dyn PlanCheck>>,
}

impl PlanValidator {
    /// Create a validator with the given checks.
    pub fn new(checks: Vec<Box<dyn PlanCheck>>) -> Self {
        Self { checks }
    }

    /// Create the validator with all standard checks.
    pub fn default_checks() -> Self {
        Self {
            checks: vec![
                Box::new(ParameterCheck),
                Box::new(ChannelCheck),
                Box::new(OperationCheck),
                Box::new(GridCheck),
                Box::new(ResizeCheck),
            ],
        }
    }

    /// Add a custom check.
    pub fn add_check(&mut self, check: Box<dyn PlanCheck>) {
        self.checks.push(check);
    }

    /// Run every check.
    pub fn validate(&self, ctx: &PlanContext<'_>) -> ValidationReport {
        let start = Instant::now();
        let mut report = ValidationReport::new();

        for check in &self.checks {
            match check.check(ctx) {
                Ok(warnings) => {
                    for warning in warnings {
                        report.add_warning(warning);
                    }
                }
                Err(errors) => {
                    log::debug!("{} found {} error(s)", check.name(), errors.len());
                    for error in errors {
                        report.add_error(error);
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Quick validation - just check if the run can start.
    pub fn can_execute(&self, ctx: &PlanContext<'_>) -> bool {
        self.validate(ctx).can_execute()
    }
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::default_checks()
    }
}
