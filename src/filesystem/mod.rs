// src/filesystem/mod.rs

//! Filesystem helpers shared by acquisition, building and sanitation

mod path;
mod tree;

pub use path::{check_dir_name, safe_join, sanitize_path};
pub use tree::{copy_tree, remove_entry};
