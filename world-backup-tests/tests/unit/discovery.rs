//! Unit tests for target discovery

use std::fs;
use test_utils::{populate_world, ConfigBuilder, TestContext};
use world_backup::managers::discovery::discover_targets;

#[test]
fn test_discover_nonexistent_root() {
    let ctx = TestContext::new();
    let targets = discover_targets(&ctx.temp_dir().join("no-such-saves"), &[]);
    assert!(targets.is_empty());
}

#[test]
fn test_discover_root_is_a_file() {
    let ctx = TestContext::new();
    let file = ctx.create_file("saves", "not a directory");
    assert!(discover_targets(&file, &[]).is_empty());
}

#[test]
fn test_discover_skips_files() {
    let builder = ConfigBuilder::new().add_worlds(&["Alpha", "Beta"]);
    fs::write(builder.saves_dir().join("launcher_profiles.json"), "{}").unwrap();

    let targets = discover_targets(builder.saves_dir(), &[]);
    let names: Vec<_> = targets.iter().map(|t| t.name.clone()).collect();

    assert_eq!(names, vec!["Alpha", "Beta"]);
}

#[test]
fn test_discover_source_paths() {
    let ctx = TestContext::new();
    let saves = ctx.create_subdir("saves");
    let world = populate_world(&saves, "Steve's World");

    let targets = discover_targets(&saves, &[]);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].name, "Steve's World");
    assert_eq!(targets[0].source_path, world);
}

#[test]
fn test_discover_honors_exclude() {
    let builder = ConfigBuilder::new().add_worlds(&["Alpha", "Beta", "Gamma"]);
    let targets = discover_targets(builder.saves_dir(), &["Beta".to_string()]);

    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|t| t.name != "Beta"));
}
