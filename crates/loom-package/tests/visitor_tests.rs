//! Integration tests for dependency discovery over real package folders

use loom_package::{resolve_workspace, DependencyKind, DependencyVisitor, PackageError, Role};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_package(dir: &Path, json: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("package.json"), json).unwrap();
}

/// shop (root, monorepo)
///   deps:    @shop/core (member), @loom/di, left-pad (third party)
///   devDeps: @loom/testing (declares test role)
///   peer:    missing-peer (not installed)
fn create_shop_workspace() -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();

    write_package(
        root,
        r#"{
            "name": "shop",
            "version": "1.0.0",
            "workspaces": ["packages/*"],
            "dependencies": {"@shop/core": "*", "@loom/di": "^1.0.0", "left-pad": "^1.0.0"},
            "devDependencies": {"@loom/testing": "^1.0.0"},
            "peerDependencies": {"missing-peer": "*"}
        }"#,
    );
    write_package(
        &root.join("packages/core"),
        r#"{"name": "@shop/core", "version": "1.0.0", "dependencies": {"@loom/di": "^1.0.0"}}"#,
    );
    write_package(
        &root.join("node_modules/@loom/di"),
        r#"{"name": "@loom/di", "version": "1.4.0", "dependencies": {"@loom/reflect": "^1.0.0"}, "loom": {}}"#,
    );
    write_package(
        &root.join("node_modules/@loom/reflect"),
        r#"{"name": "@loom/reflect", "version": "1.1.0", "loom": {"profiles": ["metadata"]}}"#,
    );
    write_package(
        &root.join("node_modules/left-pad"),
        r#"{"name": "left-pad", "version": "1.3.0", "dependencies": {"@loom/hidden": "*"}}"#,
    );
    write_package(
        &root.join("node_modules/@loom/hidden"),
        r#"{"name": "@loom/hidden", "version": "1.0.0", "loom": {}}"#,
    );
    write_package(
        &root.join("node_modules/@loom/testing"),
        r#"{"name": "@loom/testing", "version": "2.0.0", "dependencies": {"spy-kit": "*"}, "loom": {"roles": ["test"]}}"#,
    );
    write_package(
        &root.join("node_modules/spy-kit"),
        r#"{"name": "spy-kit", "version": "0.3.0", "loom": {}}"#,
    );

    temp
}

#[test]
fn test_visit_collects_framework_and_workspace_packages() {
    let temp = create_shop_workspace();
    let graph = resolve_workspace(temp.path()).unwrap();

    let names: Vec<_> = graph.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["shop", "@loom/di", "@loom/reflect", "@loom/testing", "spy-kit", "@shop/core"]
    );
    assert!(!graph.contains("left-pad"));
    assert!(!graph.contains("@loom/hidden"));
    assert!(!graph.contains("missing-peer"));
}

#[test]
fn test_visit_records_parents_and_edges() {
    let temp = create_shop_workspace();
    let graph = resolve_workspace(temp.path()).unwrap();

    let di = graph.get("@loom/di").unwrap();
    let expected: BTreeSet<String> = ["@shop/core", "shop"].iter().map(|s| s.to_string()).collect();
    assert_eq!(di.parents, expected);
    assert!(di.internal);
    assert_eq!(di.version, "1.4.0");

    let root = graph.get("shop").unwrap();
    assert_eq!(root.edge_to("@loom/testing"), Some(DependencyKind::Development));
    assert_eq!(root.edge_to("left-pad"), None);
}

#[test]
fn test_completion_settles_prod_and_roles() {
    let temp = create_shop_workspace();
    let graph = resolve_workspace(temp.path()).unwrap();

    let standard = BTreeSet::from([Role::Standard]);
    let root = graph.get("shop").unwrap();
    assert!(root.main && root.prod);
    assert_eq!(root.roles, standard);

    let core = graph.get("@shop/core").unwrap();
    assert!(core.workspace && core.role_root && core.prod);
    assert_eq!(core.roles, standard);

    assert!(graph.get("@loom/reflect").unwrap().prod);
    assert_eq!(graph.get("@loom/reflect").unwrap().profiles, vec!["metadata"]);

    let testing = graph.get("@loom/testing").unwrap();
    assert!(!testing.prod);
    assert_eq!(testing.roles, BTreeSet::from([Role::Test]));
    let spy = graph.get("spy-kit").unwrap();
    assert!(!spy.prod);
    assert_eq!(spy.roles, BTreeSet::from([Role::Test]));
}

#[test]
fn test_visit_without_completion_keeps_transient_roles() {
    let temp = create_shop_workspace();
    let visitor = DependencyVisitor::new(temp.path()).unwrap();
    assert!(visitor.members().is_monorepo());

    let graph = visitor.visit().unwrap();
    assert!(!graph.get("@loom/di").unwrap().prod);
    assert_eq!(
        graph.get("@loom/testing").unwrap().roles,
        BTreeSet::from([Role::Test])
    );
}

#[test]
fn test_cycle_between_framework_packages_fails() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write_package(root, r#"{"name": "app", "dependencies": {"@loom/a": "*"}}"#);
    write_package(
        &root.join("node_modules/@loom/a"),
        r#"{"name": "@loom/a", "dependencies": {"@loom/b": "*"}, "loom": {}}"#,
    );
    write_package(
        &root.join("node_modules/@loom/b"),
        r#"{"name": "@loom/b", "dependencies": {"@loom/a": "*"}, "loom": {}}"#,
    );

    match resolve_workspace(root) {
        Err(PackageError::CircularDependency { unresolved }) => {
            assert_eq!(unresolved, vec!["@loom/a", "@loom/b"]);
        }
        other => panic!("Expected CircularDependency error, got {:?}", other),
    }
}

#[test]
fn test_missing_root_descriptor() {
    let temp = tempfile::tempdir().unwrap();
    let result = DependencyVisitor::new(temp.path());
    assert!(matches!(result, Err(PackageError::MissingDescriptor(_))));
}

#[test]
fn test_nested_node_modules_resolution() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write_package(root, r#"{"name": "app", "dependencies": {"@loom/web": "*"}}"#);
    write_package(
        &root.join("node_modules/@loom/web"),
        r#"{"name": "@loom/web", "dependencies": {"@loom/http": "*"}, "loom": {}}"#,
    );
    write_package(
        &root.join("node_modules/@loom/web/node_modules/@loom/http"),
        r#"{"name": "@loom/http", "version": "3.0.0", "loom": {}}"#,
    );

    let graph = resolve_workspace(root).unwrap();
    let http = graph.get("@loom/http").unwrap();
    assert_eq!(http.version, "3.0.0");
    assert!(http.dir.ends_with("node_modules/@loom/web/node_modules/@loom/http"));
}

#[test]
fn test_recursive_and_negated_workspace_patterns() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    write_package(
        root,
        r#"{
            "name": "shop",
            "workspaces": ["libs/**", "!libs/legacy"],
            "dependencies": {"@shop/orm": "*", "@shop/legacy": "*"}
        }"#,
    );
    write_package(&root.join("libs/data/orm"), r#"{"name": "@shop/orm", "version": "0.1.0"}"#);
    write_package(&root.join("libs/legacy"), r#"{"name": "@shop/legacy", "version": "0.1.0"}"#);

    let visitor = DependencyVisitor::new(root).unwrap();
    let members: Vec<_> = visitor.members().iter().map(|(n, _)| n).collect();
    assert_eq!(members, vec!["@shop/orm"]);

    let graph = resolve_workspace(root).unwrap();
    let orm = graph.get("@shop/orm").unwrap();
    assert!(orm.workspace);
    assert_eq!(orm.dir, root.join("libs/data/orm"));
    assert!(!graph.contains("@shop/legacy"));
}
