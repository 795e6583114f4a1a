//! Configuration loading, hashing and merging

mod document;
mod hash;
mod loader;
mod merge;

pub use document::{
    AliasSpec, Completion, ConfigDocument, DefinedNames, EnvSpec, FUNCTION_PREFIX, MergedConfig,
};
pub use hash::{HIERARCHY_SEPARATOR, hash_bytes, hash_file, hierarchy_hash};
pub use loader::{CONFIG_NAMES, Format, LoadedHierarchy, Loader, load};
pub use merge::{merge, merge_layers};
