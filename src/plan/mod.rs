//! Plan resolution and validation.
//!
//! Provides the channel plan resolver and the eager checks that run before
//! any plane is processed:
//! 1. Parameter ranges
//! 2. Channel names against scene metadata
//! 3. Operation names against the registry
//! 4. Grid shape against the tile count
//! 5. Uniform resize depth

pub mod checks;
pub mod resolver;

pub use checks::{PlanCheck, PlanContext, PlanValidator};
pub use resolver::{resolve_plan, resolve_uniform_plan, ChannelPlan};
