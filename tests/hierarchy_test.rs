//! End-to-end tests for hierarchy resolution, authorization and cleanup
//!
//! Each test builds a small directory tree in a temp dir with its own
//! state directory, then drives the public API the way `dirvana export`
//! does on every prompt.

mod common;

use std::collections::BTreeMap;
use std::path::Path;

use dirvana::cleanup::{calculate_cleanup, cleanup_names};
use dirvana::config::{Loader, hash_file};
use dirvana::shell::{AutoApprove, SystemRunner};
use dirvana::{ExportRequest, Shell, active_chain};

use common::Tree;

#[test]
fn test_mixed_authorization_chain_and_cleanup() {
    let tree = Tree::new();
    let a = tree.config("A", "aliases:\n  a: echo a\n");
    let b = tree.config("A/B", "aliases:\n  b: echo b\n");
    let c = tree.config("A/B/C", "aliases:\n  c: echo c\n");

    let mut engine = tree.engine();
    engine.allow(&a).unwrap();
    engine.allow(&c).unwrap();

    assert_eq!(engine.active_chain(&c).dirs(), vec![a.clone(), c.clone()]);

    let at_c = engine
        .export(&request(&c, None), &AutoApprove, &SystemRunner)
        .unwrap();
    assert!(at_c.script.contains("alias a='echo a'"));
    assert!(at_c.script.contains("alias c='echo c'"));
    assert!(!at_c.script.contains("alias b="));

    let at_b = engine
        .export(&request(&b, Some(&c)), &AutoApprove, &SystemRunner)
        .unwrap();
    assert_eq!(at_b.cleanup.aliases, vec!["c".to_string()]);
    assert!(at_b.script.contains("unalias c"));
    assert!(!at_b.script.contains("unalias a"));
    assert!(at_b.script.contains("alias a='echo a'"));
    assert!(at_b.hint.is_some());
}

#[test]
fn test_local_only_resets_hierarchy() {
    let tree = Tree::new();
    tree.config("P", "aliases:\n  p: echo parent\n");
    let g = tree.config("P/G", "local_only: true\naliases:\n  g: echo g\n");

    let loaded = Loader::default().load_hierarchy(&g).unwrap();
    let names: Vec<_> = loaded.merged.aliases.keys().cloned().collect();
    assert_eq!(names, vec!["g".to_string()]);
}

#[test]
fn test_local_only_reset_still_passes_down() {
    let tree = Tree::new();
    tree.config("P", "aliases:\n  p: echo parent\n");
    tree.config("P/G", "local_only: true\naliases:\n  g: echo g\n");
    let leaf = tree.config("P/G/L", "aliases:\n  l: echo l\n");

    let merged = Loader::default().load_hierarchy(&leaf).unwrap().merged;
    assert!(merged.aliases.contains_key("g"));
    assert!(merged.aliases.contains_key("l"));
    assert!(!merged.aliases.contains_key("p"));
}

#[test]
fn test_shell_command_reapproval() {
    let tree = Tree::new();
    let p = tree.config("P", "");
    let mut auth = tree.auth();
    auth.allow(&p).unwrap();

    let mut commands = BTreeMap::new();
    commands.insert("X".to_string(), "whoami".to_string());
    assert!(auth.requires_shell_approval(&p, &commands));

    auth.approve_shell_commands(&p, &commands).unwrap();
    assert!(!auth.requires_shell_approval(&p, &commands));

    commands.insert("X".to_string(), "id".to_string());
    assert!(auth.requires_shell_approval(&p, &commands));
    assert!(auth.is_allowed(&p));
}

#[test]
fn test_legacy_authorizations_migrate_on_first_write() {
    let tree = Tree::new();
    let legacy = tree.state().join("authorized.json");
    std::fs::create_dir_all(tree.state()).unwrap();
    std::fs::write(&legacy, r#"["/x","/y"]"#).unwrap();

    let mut auth = tree.auth();
    assert!(auth.is_allowed(Path::new("/x")));
    auth.allow(Path::new("/z")).unwrap();

    let versioned: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(tree.state().join("authorized_v2.json")).unwrap(),
    )
    .unwrap();
    for p in ["/x", "/y", "/z"] {
        assert_eq!(versioned["directories"][p]["allowed"], true, "{}", p);
    }
    assert_eq!(std::fs::read_to_string(&legacy).unwrap(), r#"["/x","/y"]"#);
}

#[test]
fn test_authorization_change_invalidates_hierarchy_cache() {
    let tree = Tree::new();
    let a = tree.config("A", "aliases:\n  a: echo a\n");
    let b = tree.config("A/B", "aliases:\n  b: echo b\n");

    let mut engine = tree.engine();
    engine.allow(&b).unwrap();
    engine
        .export(&request(&b, None), &AutoApprove, &SystemRunner)
        .unwrap();

    engine.allow(&a).unwrap();
    let out = engine
        .export(&request(&b, None), &AutoApprove, &SystemRunner)
        .unwrap();
    assert!(!out.cache_hit);
    assert!(out.script.contains("alias a='echo a'"));

    let entry = engine.cache().get(&b).unwrap();
    let expected = format!(
        "{}:{}",
        hash_file(&a.join(".dirvana.yml")).unwrap(),
        hash_file(&b.join(".dirvana.yml")).unwrap()
    );
    assert_eq!(entry.hierarchy_hash, expected);
    assert_eq!(entry.hierarchy_paths, vec![a, b]);
}

#[test]
fn test_inherited_directory_has_no_cleanup_list() {
    let tree = Tree::new();
    let a = tree.config("A", "aliases:\n  a: echo a\n");
    let sub = tree.dir("A/sub");

    let mut engine = tree.engine();
    engine.allow(&a).unwrap();
    let out = engine
        .export(&request(&sub, None), &AutoApprove, &SystemRunner)
        .unwrap();
    assert!(out.script.contains("alias a='echo a'"));

    let inherited = engine.cache().get(&sub).unwrap();
    assert!(inherited.alias_names.is_none());
    assert!(inherited.merged_command_map.is_some());

    // The ancestor got a file-level entry while exporting the subdirectory
    let owner = engine.cache().get(&a).unwrap();
    assert_eq!(owner.alias_names, Some(vec!["a".to_string()]));

    let outside = tree.dir("elsewhere");
    let left = engine
        .export(&request(&outside, Some(&sub)), &AutoApprove, &SystemRunner)
        .unwrap();
    assert_eq!(left.cleanup.aliases, vec!["a".to_string()]);
}

#[test]
fn test_cleanup_is_set_difference() {
    let tree = Tree::new();
    let a = tree.config("A", "aliases:\n  a: echo a\n");
    let c = tree.config("A/B/C", "aliases:\n  c: echo c\n");

    let mut auth = tree.auth();
    auth.allow(&a).unwrap();
    auth.allow(&c).unwrap();
    let loader = Loader::default();

    let prev = active_chain(&loader, &auth, &c).dirs();
    let curr = active_chain(&loader, &auth, &a).dirs();
    assert_eq!(calculate_cleanup(&prev, &curr), vec![c.clone()]);
    assert!(calculate_cleanup(&prev, &prev).is_empty());

    // Nothing cached yet for C: cleanup is best-effort and emits nothing
    let cache = dirvana::Cache::load(tree.state().join("cache.json")).unwrap();
    assert!(cleanup_names(&cache, &[c]).is_empty());
}

fn request<'a>(current: &'a Path, previous: Option<&'a Path>) -> ExportRequest<'a> {
    ExportRequest {
        current,
        previous,
        shell: Shell::Bash,
    }
}
