//! Path resolution: string fixes, identifier conversion and nearest-ancestor mapping.

pub mod fix;
mod resolver;

pub use fix::{restore_biome, FixRule, FixRules};
pub use resolver::{nearest_ancestor, IdScheme, PathResolver, ResolverConfig};
