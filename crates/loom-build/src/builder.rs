//! Build orchestration
//!
//! snapshot -> delta -> plugin dispatch over changed sources (when a
//! compiler host is attached) -> outputs -> manifest.

use crate::delta::{event_count, produce_delta, Delta, DeltaAction, DeltaEvent};
use crate::error::{BuildError, BuildResult};
use crate::index::{FindConfig, ManifestIndex};
use crate::manifest::{compiled_path, module_output, FileEntry, FileType, FolderCategory, ManifestModule, ManifestRoot};
use crate::persist::{load_previous, save_manifest};
use crate::scan::file_type_for;
use crate::session::BuildSession;
use crate::snapshot::SnapshotBuilder;
use loom_config::Config;
use loom_package::{resolve_workspace, ModuleGraph, Role};
use loom_transform::{builtin, print_unit, CompilerHost, Dispatcher, PluginCatalog, PluginRegistry};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Result of planning a build: what the workspace looks like now and what changed
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub manifest: ManifestRoot,
    pub previous: Option<ManifestRoot>,
    pub delta: Delta,
}

impl BuildPlan {
    pub fn event_count(&self) -> usize {
        event_count(&self.delta)
    }
}

/// Build statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// Modules in the manifest
    pub total_modules: usize,
    /// Delta events across all modules
    pub events: usize,
    /// Time spent building the snapshot and delta
    pub planning_time: Duration,
    /// Time spent producing outputs
    pub output_time: Duration,
}

/// What a build did
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub delta: Delta,
    /// Outputs written from transformed sources
    pub transformed: Vec<PathBuf>,
    /// Outputs copied from non-source files
    pub copied: Vec<PathBuf>,
    /// Outputs deleted for removed files
    pub removed: Vec<PathBuf>,
    /// Source files left for the compiler because no host is attached
    pub pending: Vec<PathBuf>,
    pub stats: BuildStats,
}

/// Main builder for a workspace
pub struct Builder {
    config: Config,
    session: BuildSession,
    host: Option<Box<dyn CompilerHost>>,
    catalog: PluginCatalog,
    full_scan: bool,
}

impl Builder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session: BuildSession::new(),
            host: None,
            catalog: PluginCatalog::new(),
            full_scan: false,
        }
    }

    /// Attach a compiler host; sources are then transformed instead of left pending
    pub fn with_host(mut self, host: impl CompilerHost + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    /// Set the plugin registration table
    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Scan every folder of every module
    pub fn with_full_scan(mut self, full: bool) -> Self {
        self.full_scan = full;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Resolve the workspace's module graph
    pub fn graph(&self) -> BuildResult<ModuleGraph> {
        Ok(resolve_workspace(&self.config.workspace_root)?)
    }

    /// Snapshot the workspace and compare it with the persisted manifest
    pub fn plan(&mut self) -> BuildResult<BuildPlan> {
        let graph = self.graph()?;
        let manifest = SnapshotBuilder::new(&self.config, &mut self.session)
            .full_scan(self.full_scan)
            .build(&graph)?;
        let previous = load_previous(&self.config.manifest_path);
        let delta = produce_delta(&self.config.output_root, &manifest, previous.as_ref());

        Ok(BuildPlan {
            manifest,
            previous,
            delta,
        })
    }

    /// Execute the build
    pub fn build(&mut self) -> BuildResult<BuildReport> {
        let start = Instant::now();
        let plan = self.plan()?;
        let planning_time = start.elapsed();

        let index = ManifestIndex::from_manifest(&self.config.manifest_path, plan.manifest.clone());
        let registry = self.registry(&index);

        let output_start = Instant::now();
        let mut report = BuildReport::default();
        for (name, events) in &plan.delta {
            for event in events {
                match plan.manifest.module(name) {
                    Some(module) if event.action.needs_output() => {
                        self.produce(module, event, &index, &registry, &mut report)?;
                    }
                    _ => self.remove(name, event, &mut report)?,
                }
            }
        }

        save_manifest(&plan.manifest, &self.config.manifest_path)?;

        report.stats = BuildStats {
            total_modules: plan.manifest.modules.len(),
            events: plan.event_count(),
            planning_time,
            output_time: output_start.elapsed(),
        };
        info!(
            modules = report.stats.total_modules,
            events = report.stats.events,
            transformed = report.transformed.len(),
            copied = report.copied.len(),
            removed = report.removed.len(),
            pending = report.pending.len(),
            "build finished"
        );
        report.delta = plan.delta;
        Ok(report)
    }

    /// Built-in plugins plus those of every compile-time registration file
    /// admitted by the active profiles
    fn registry(&self, index: &ManifestIndex) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        builtin::install(&mut registry);

        let query = FindConfig::from_config(&self.config).categories([FolderCategory::Plugins]);
        let registrations: BTreeSet<&str> = index
            .find(&query)
            .into_iter()
            .filter(|f| f.entry.role == Some(Role::Compile))
            .map(|f| f.id.as_str())
            .collect();
        for id in registrations {
            if self.catalog.install(id, &mut registry) {
                debug!(registration = id, "installed plugins");
            }
        }
        registry
    }

    fn produce(
        &self,
        module: &ManifestModule,
        event: &DeltaEvent,
        index: &ManifestIndex,
        registry: &PluginRegistry,
        report: &mut BuildReport,
    ) -> BuildResult<()> {
        let Some(entry) = find_entry(module, event) else {
            return Ok(());
        };
        let source = module.source_path(entry);
        let output = module.output_path(entry);

        if entry.file_type != FileType::Source {
            copy_file(&source, &output)?;
            report.copied.push(output);
            return Ok(());
        }

        let Some(host) = self.host.as_deref() else {
            report.pending.push(source);
            return Ok(());
        };

        let text = fs::read_to_string(&source).map_err(|e| BuildError::io(&source, e))?;
        let unit = host.parse(&source, &text)?;
        let unit = Dispatcher::new(registry, host.semantic(), index).transform(unit)?;
        write_file(&output, &print_unit(&unit))?;

        debug!(module = %module.name, unit = %source.display(), action = ?event.action, "transformed unit");
        report.transformed.push(output);
        Ok(())
    }

    fn remove(&self, name: &str, event: &DeltaEvent, report: &mut BuildReport) -> BuildResult<()> {
        if event.action != DeltaAction::Removed {
            return Ok(());
        }
        let file_type = file_type_for(&event.path, event.category);
        let output = module_output(&self.config.output_root, name).join(compiled_path(&event.path, file_type));

        match fs::remove_file(&output) {
            Ok(()) => {
                debug!(module = name, output = %output.display(), "removed output");
                report.removed.push(output);
                Ok(())
            }
            // gone already
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(&output, e)),
        }
    }
}

fn find_entry<'m>(module: &'m ManifestModule, event: &DeltaEvent) -> Option<&'m FileEntry> {
    module
        .files
        .get(&event.category)
        .and_then(|files| files.iter().find(|f| f.path == event.path))
}

fn ensure_parent(path: &Path) -> BuildResult<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e)),
        None => Ok(()),
    }
}

fn copy_file(from: &Path, to: &Path) -> BuildResult<()> {
    ensure_parent(to)?;
    fs::copy(from, to).map_err(|e| BuildError::io(from, e))?;
    Ok(())
}

fn write_file(path: &Path, content: &str) -> BuildResult<()> {
    ensure_parent(path)?;
    fs::write(path, content).map_err(|e| BuildError::io(path, e))
}
