//! Integration tests for snapshots, deltas, the index and full builds

use loom_build::{
    module_output, BuildError, Builder, Delta, DeltaAction, DeltaEvent, FindConfig,
    FolderCategory, ManifestIndex, MANIFEST_VERSION,
};
use loom_config::{Config, ProjectConfig};
use loom_transform::ast::{ClassDecl, Expr, ImportBinding, ImportDecl, Stmt};
use loom_transform::{
    InsertAt, MemoryHost, MemorySemanticModel, Node, NodeCategory, NodeTransformer, Phase,
    PluginCatalog, PluginContext, PluginError, PluginRegistry, ReferenceKind, ReferenceResolver,
    SourceUnit,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// app (root, monorepo over packages/*) depends on lib (member, profile `cloud`)
fn create_workspace() -> (TempDir, PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().canonicalize().unwrap();

    write(
        &root,
        "package.json",
        r#"{"name": "app", "version": "1.0.0", "workspaces": ["packages/*"], "dependencies": {"lib": "*"}}"#,
    );
    write(&root, "index.ts", "export * from './src/main';");
    write(&root, "src/main.ts", "import { UserService } from './services';");
    write(&root, "src/services/index.ts", "export * from './user';");
    write(&root, "src/services/user.ts", "export class UserService {}");
    write(&root, "test/main.test.ts", "");
    write(&root, "support/compile-time.plugins.ts", "");

    let lib = root.join("packages/lib");
    write(
        &lib,
        "package.json",
        r#"{"name": "lib", "version": "0.1.0", "loom": {"profiles": ["cloud"]}}"#,
    );
    write(&lib, "README.md", "# lib");
    write(&lib, "src/util.ts", "export const util = 1;");

    (temp, root)
}

fn config(root: &Path) -> Config {
    Config::resolve(root, &ProjectConfig::default())
}

fn paths(delta: &Delta, module: &str) -> BTreeSet<String> {
    delta[module].iter().map(|e| e.path.clone()).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_first_plan_adds_every_tracked_file() {
    let (_temp, root) = create_workspace();
    let plan = Builder::new(config(&root)).plan().unwrap();

    assert!(plan.previous.is_none());
    assert!(plan.manifest.workspace.monorepo);
    assert_eq!(
        paths(&plan.delta, "app"),
        set(&[
            "index.ts",
            "package.json",
            "src/main.ts",
            "src/services/index.ts",
            "src/services/user.ts",
            "test/main.test.ts",
        ])
    );
    assert_eq!(paths(&plan.delta, "lib"), set(&["README.md", "package.json", "src/util.ts"]));
    assert!(plan
        .delta
        .values()
        .flatten()
        .all(|e| e.action == DeltaAction::Added));

    let app = plan.manifest.module("app").unwrap();
    assert!(app.files.contains_key(&FolderCategory::Plugins));
}

#[test]
fn test_snapshots_are_idempotent() {
    let (_temp, root) = create_workspace();
    let first = Builder::new(config(&root)).plan().unwrap().manifest;
    let second = Builder::new(config(&root)).plan().unwrap().manifest;
    assert_eq!(first.without_timestamp(), second.without_timestamp());
}

#[test]
fn test_build_without_host_leaves_sources_pending() {
    let (_temp, root) = create_workspace();
    let config = config(&root);
    let report = Builder::new(config.clone()).build().unwrap();

    assert!(config.manifest_path.is_file());
    assert_eq!(report.pending.len(), 6);
    assert!(report
        .copied
        .contains(&module_output(&config.output_root, "lib").join("README.md")));
    assert_eq!(report.stats.total_modules, 2);

    // copied outputs are current; sources were never compiled
    let plan = Builder::new(config).plan().unwrap();
    let events: Vec<_> = plan.delta.values().flatten().collect();
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| e.action == DeltaAction::Missing));
    assert!(plan.delta["lib"].iter().all(|e| e.path == "src/util.ts"));
}

#[test]
fn test_removed_file_deletes_its_output() {
    let (_temp, root) = create_workspace();
    let config = config(&root);
    Builder::new(config.clone()).build().unwrap();

    let output = module_output(&config.output_root, "lib").join("src/util.js");
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    fs::write(&output, "export const util = 1;").unwrap();
    fs::remove_file(root.join("packages/lib/src/util.ts")).unwrap();

    let report = Builder::new(config).build().unwrap();
    let removed: Vec<_> = report.delta["lib"]
        .iter()
        .filter(|e| e.action == DeltaAction::Removed)
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(removed, vec!["src/util.ts"]);
    assert_eq!(report.removed, vec![output.clone()]);
    assert!(!output.exists());
}

#[test]
fn test_index_lookups_and_stable_ids() {
    let (_temp, root) = create_workspace();
    let config = config(&root);
    Builder::new(config.clone()).build().unwrap();

    let mut index = ManifestIndex::load(&config.manifest_path).unwrap();
    let user = root.join("src/services/user.ts");
    assert_eq!(index.get_id(&user), Some("app/src/services:user"));

    let output = index.by_source(&user).unwrap().output.clone();
    assert_eq!(index.by_output(&output).unwrap().source, user);
    assert_eq!(index.by_id("app/src/services:user").unwrap().source, user);
    assert_eq!(index.by_specifier("app/src/services/user.js").unwrap().source, user);
    assert_eq!(index.by_specifier("app").unwrap().source, root.join("index.ts"));
    assert_eq!(
        index.module_for_folder(&root.join("packages/lib/src")).unwrap().name,
        "lib"
    );

    let services = index
        .resolve_reference(&root.join("src/main.ts"), "./services")
        .unwrap();
    assert_eq!(services.kind, ReferenceKind::Directory);
    assert_eq!(services.path, root.join("src/services/index.ts"));
    assert_eq!(services.project.as_deref(), Some("app"));

    let location = index.locate(&root.join("support/compile-time.plugins.ts")).unwrap();
    assert_eq!(location.category, "plugins");
    assert!(location.compile_time_only);

    index.reset().unwrap();
    assert_eq!(index.get_id(&user), Some("app/src/services:user"));
}

#[test]
fn test_find_filters_categories_and_profiles() {
    let (_temp, root) = create_workspace();
    let config = config(&root);
    Builder::new(config.clone()).build().unwrap();
    let index = ManifestIndex::load(&config.manifest_path).unwrap();

    let names = |files: Vec<&loom_build::IndexedFile>| -> BTreeSet<String> {
        files.iter().map(|f| f.id.clone()).collect()
    };

    let src = FindConfig::new().categories([FolderCategory::Src]);
    assert_eq!(
        names(index.find(&src)),
        set(&["app/src:main", "app/src/services:index", "app/src/services:user"])
    );

    let cloud = vec!["cloud".to_string()];
    let src_cloud = FindConfig::new()
        .categories([FolderCategory::Src])
        .profiles(&cloud);
    assert!(names(index.find(&src_cloud)).contains("lib/src:util"));

    let services_only = FindConfig::new().filter(|p| p.to_string_lossy().contains("services"));
    assert_eq!(index.find(&services_only).len(), 2);
}

#[test]
fn test_reinit_for_module_keeps_ids() {
    let (_temp, root) = create_workspace();
    let lib = root.join("packages/lib");
    Builder::new(config(&lib)).build().unwrap();
    let config = config(&root);
    Builder::new(config.clone()).build().unwrap();

    let mut index = ManifestIndex::load(&config.manifest_path).unwrap();
    let util = lib.join("src/util.ts");
    let before = index.get_id(&util).map(str::to_string);

    index.reinit_for_module("lib").unwrap();
    assert_eq!(index.manifest().main.name, "lib");
    assert_eq!(index.get_id(&util).map(str::to_string), before);
    assert!(index.by_source(&root.join("src/main.ts")).is_none());

    let err = index.reinit_for_module("app").unwrap_err();
    assert!(matches!(err, BuildError::ModuleNotFound { .. }));
}

#[test]
fn test_incompatible_manifest_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("manifest.json");
    fs::write(&path, format!(r#"{{"version": {}}}"#, MANIFEST_VERSION + 1)).unwrap();

    let err = ManifestIndex::load(&path).unwrap_err();
    assert!(matches!(err, BuildError::IncompatibleManifest { found, .. } if found == MANIFEST_VERSION + 1));
}

fn ready(node: Node, ctx: &mut PluginContext<'_>) -> Result<Node, PluginError> {
    ctx.insert(InsertAt::End, Stmt::Expr(Expr::call(Expr::ident("ready"), vec![])));
    Ok(node)
}

fn install_ready(registry: &mut PluginRegistry) {
    registry.register(NodeTransformer::new("ready", NodeCategory::File, Phase::After, ready));
}

#[test]
fn test_build_transforms_sources_through_host() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().canonicalize().unwrap();
    write(&root, "package.json", r#"{"name": "solo", "version": "1.0.0"}"#);
    write(&root, "src/user.ts", "export class User {}");
    write(&root, "src/main.ts", "import { User } from './user';");
    write(&root, "support/compile-time.plugins.ts", "");

    let host = MemoryHost::new(MemorySemanticModel::default())
        .with_unit(SourceUnit::new(
            root.join("src/user.ts"),
            vec![Stmt::Class(ClassDecl {
                name: "User".into(),
                exported: true,
                decorators: vec![],
                extends: None,
                members: vec![],
            })],
        ))
        .with_unit(SourceUnit::new(
            root.join("src/main.ts"),
            vec![
                Stmt::Import(ImportDecl::new("./user", vec![ImportBinding::named("User")])),
                Stmt::Expr(Expr::call(
                    Expr::member(Expr::ident("console"), "log"),
                    vec![Expr::ident("User")],
                )),
            ],
        ));
    let catalog = PluginCatalog::new().with("solo/support:compile-time.plugins", install_ready);

    let config = config(&root);
    let report = Builder::new(config.clone())
        .with_host(host)
        .with_catalog(catalog)
        .build()
        .unwrap();

    assert!(report.pending.is_empty());
    assert_eq!(report.transformed.len(), 2);

    let out = module_output(&config.output_root, "solo");
    assert_eq!(
        fs::read_to_string(out.join("src/user.js")).unwrap(),
        r#"import { registry as __loom } from "@loom/runtime";
export class User {}
__loom.registerClass(User, "solo/src:user:User", []);
ready();
"#
    );
    assert_eq!(
        fs::read_to_string(out.join("src/main.js")).unwrap(),
        "import { User } from \"./user.js\";\nconsole.log(User);\nready();\n"
    );
    assert!(out.join("package.json").is_file());
}

fn class_unit(path: PathBuf, name: &str) -> SourceUnit {
    SourceUnit::new(
        path,
        vec![Stmt::Class(ClassDecl {
            name: name.into(),
            exported: true,
            decorators: vec![],
            extends: None,
            members: vec![],
        })],
    )
}

/// app (root) with two sources, depending on member lib with one source
fn create_compiled_workspace() -> (TempDir, PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().canonicalize().unwrap();
    write(
        &root,
        "package.json",
        r#"{"name": "app", "version": "1.0.0", "workspaces": ["packages/*"], "dependencies": {"lib": "*"}}"#,
    );
    write(&root, "src/main.ts", "export class Main {}");
    write(&root, "src/user.ts", "export class User {}");
    write(&root, "packages/lib/package.json", r#"{"name": "lib", "version": "0.1.0"}"#);
    write(&root, "packages/lib/src/util.ts", "export class Util {}");
    (temp, root)
}

fn compiled_host(root: &Path) -> MemoryHost {
    MemoryHost::new(MemorySemanticModel::default())
        .with_unit(class_unit(root.join("src/main.ts"), "Main"))
        .with_unit(class_unit(root.join("src/user.ts"), "User"))
        .with_unit(class_unit(root.join("packages/lib/src/util.ts"), "Util"))
}

#[test]
fn test_second_build_only_transforms_changed_unit() {
    let (_temp, root) = create_compiled_workspace();
    let config = config(&root);

    let first = Builder::new(config.clone())
        .with_host(compiled_host(&root))
        .build()
        .unwrap();
    assert_eq!(first.transformed.len(), 3);

    let unchanged = Builder::new(config.clone()).plan().unwrap();
    assert_eq!(unchanged.event_count(), 0);

    let user = root.join("src/user.ts");
    fs::write(&user, "export class User { name = ''; }").unwrap();
    fs::File::options()
        .write(true)
        .open(&user)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();

    let second = Builder::new(config.clone())
        .with_host(compiled_host(&root))
        .build()
        .unwrap();

    let expected: Delta = [
        (
            "app".to_string(),
            vec![DeltaEvent {
                path: "src/user.ts".into(),
                category: FolderCategory::Src,
                action: DeltaAction::Changed,
            }],
        ),
        ("lib".to_string(), vec![]),
    ]
    .into_iter()
    .collect();
    assert_eq!(second.delta, expected);
    assert_eq!(
        second.transformed,
        vec![module_output(&config.output_root, "app").join("src/user.js")]
    );
    assert!(second.copied.is_empty());
}

#[test]
fn test_active_profiles_gate_find() {
    let (_temp, root) = create_workspace();
    let mut config = config(&root);
    Builder::new(config.clone()).build().unwrap();
    let index = ManifestIndex::load(&config.manifest_path).unwrap();

    let ids = |config: &Config| -> BTreeSet<String> {
        let query = FindConfig::from_config(config).categories([FolderCategory::Src]);
        index.find(&query).iter().map(|f| f.id.clone()).collect()
    };

    assert!(!ids(&config).contains("lib/src:util"));
    config.profiles = vec!["test".to_string()];
    assert!(!ids(&config).contains("lib/src:util"));
    config.profiles = vec!["cloud".to_string()];
    assert!(ids(&config).contains("lib/src:util"));
}
