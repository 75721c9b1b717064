//! Filesystem primitives shared across the pipeline.

pub mod ops;
pub mod tree_hash;

pub use ops::{copy_tree, is_empty_dir, move_entry, normalize_relative, remove_path};
pub use tree_hash::{hash_file, hash_tree};
