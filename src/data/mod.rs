//! Input data: abundance table discovery, reading, checking and hierarchy files.

mod check;
mod loader;
mod trees;

pub use check::{check_files, CheckReport, FileIssue};
pub use loader::{load_samples, read_table, DataLoader, SampleFile, TableFormat};
pub use trees::{find_tree, load_hierarchy, BIOME_TREE, SPECIES_TREE};
