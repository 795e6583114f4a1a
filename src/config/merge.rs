//! Configuration merge logic
//!
//! Implements the parent/child fold:
//! - `local_only` child: replaces the parent entirely (a reset point)
//! - Maps (aliases, functions, env): union, child wins on same name
//! - Flags: taken from the child

use super::document::{ConfigDocument, MergedConfig};

/// Merge a child document over its parent.
pub fn merge(parent: MergedConfig, child: ConfigDocument) -> MergedConfig {
    if child.local_only {
        return child;
    }

    let mut merged = parent;
    merged.aliases.extend(child.aliases);
    merged.functions.extend(child.functions);
    merged.env.extend(child.env);
    merged.local_only = child.local_only;
    merged.ignore_global = child.ignore_global;
    merged
}

/// Fold documents in root-to-leaf order (first is base, last has highest precedence)
pub fn merge_layers(layers: impl IntoIterator<Item = ConfigDocument>) -> MergedConfig {
    layers.into_iter().fold(MergedConfig::default(), merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::{AliasSpec, EnvSpec};

    fn doc(aliases: &[(&str, &str)]) -> ConfigDocument {
        let mut d = ConfigDocument::default();
        for (name, cmd) in aliases {
            d.aliases.insert(name.to_string(), AliasSpec::new(*cmd));
        }
        d
    }

    #[test]
    fn test_child_overrides_same_name() {
        let parent = doc(&[("a", "parent-a"), ("b", "parent-b")]);
        let child = doc(&[("b", "child-b"), ("c", "child-c")]);

        let merged = merge(parent, child);

        assert_eq!(merged.aliases.len(), 3);
        assert_eq!(merged.aliases["a"].command, "parent-a");
        assert_eq!(merged.aliases["b"].command, "child-b");
        assert_eq!(merged.aliases["c"].command, "child-c");
    }

    #[test]
    fn test_local_only_discards_parent() {
        let mut parent = doc(&[("p", "parent")]);
        parent
            .env
            .insert("FROM_PARENT".to_string(), EnvSpec::Static("1".to_string()));
        parent.functions.insert("f".to_string(), "echo f".to_string());

        let mut child = doc(&[("g", "child")]);
        child.local_only = true;

        let merged = merge(parent, child.clone());
        assert_eq!(merged, child);
    }

    #[test]
    fn test_flags_come_from_child() {
        let mut parent = ConfigDocument::default();
        parent.ignore_global = true;
        let child = ConfigDocument::default();

        let merged = merge(parent, child);
        assert!(!merged.ignore_global);
        assert!(!merged.local_only);
    }

    #[test]
    fn test_merge_layers_reset_in_the_middle() {
        let root = doc(&[("root", "r")]);
        let mut reset = doc(&[("mid", "m")]);
        reset.local_only = true;
        let leaf = doc(&[("leaf", "l")]);

        let merged = merge_layers(vec![root, reset, leaf]);

        assert!(!merged.aliases.contains_key("root"));
        assert!(merged.aliases.contains_key("mid"));
        assert!(merged.aliases.contains_key("leaf"));
    }
}
