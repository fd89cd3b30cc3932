//! Manifest index
//!
//! Loads a persisted manifest once and answers lookups by source path,
//! output path, import specifier, stable id and module. Caches are rebuilt
//! wholesale by [`ManifestIndex::reset`] and
//! [`ManifestIndex::reinit_for_module`]; both take `&mut self`, so no entry
//! borrowed from the index can survive them.

use crate::error::{BuildError, BuildResult};
use crate::manifest::{FileEntry, FileType, FolderCategory, ManifestModule, ManifestRoot};
use crate::persist::load_manifest;
use loom_config::{Config, MANIFEST_FILE};
use loom_transform::reference::{is_relative, normalize};
use loom_transform::{ReferenceKind, ReferenceResolver, ResolvedReference, UnitLocation};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Declaration suffixes stripped from specifiers
const TYPINGS_EXTENSIONS: [&str; 3] = [".d.mts", ".d.cts", ".d.ts"];

/// Code extensions stripped from ids and specifiers, longest first
const CODE_EXTENSIONS: [&str; 8] = [".tsx", ".mts", ".cts", ".ts", ".jsx", ".mjs", ".cjs", ".js"];

/// Extensions tried, in order, when a specifier names a file without one
const SOURCE_EXTENSIONS: [&str; 4] = [".ts", ".tsx", ".mts", ".cts"];

/// A manifest file with its derived paths and id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    /// Stable identity, e.g. `@app/core/src/services:user`
    pub id: String,
    pub module: String,
    pub category: FolderCategory,
    pub entry: FileEntry,
    pub source: PathBuf,
    pub output: PathBuf,
}

impl IndexedFile {
    pub fn is_source(&self) -> bool {
        self.entry.file_type == FileType::Source
    }
}

/// Query for [`ManifestIndex::find`]
#[derive(Default)]
pub struct FindConfig<'f> {
    /// Folder categories to include; empty means all
    pub categories: BTreeSet<FolderCategory>,
    /// Active profiles
    pub profiles: Vec<String>,
    filter: Option<Box<dyn Fn(&Path) -> bool + 'f>>,
}

impl<'f> FindConfig<'f> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query seeded with the configuration's active profiles
    pub fn from_config(config: &Config) -> Self {
        Self::new().profiles(&config.profiles)
    }

    pub fn categories(mut self, categories: impl IntoIterator<Item = FolderCategory>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn profiles(mut self, profiles: &[String]) -> Self {
        self.profiles = profiles.to_vec();
        self
    }

    /// Keep only files whose source path passes `filter`
    pub fn filter(mut self, filter: impl Fn(&Path) -> bool + 'f) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    fn admits_profiles(&self, profiles: &[String]) -> bool {
        profiles.is_empty() || profiles.iter().any(|p| self.profiles.contains(p))
    }
}

impl fmt::Debug for FindConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindConfig")
            .field("categories", &self.categories)
            .field("profiles", &self.profiles)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
struct Caches {
    files: Vec<IndexedFile>,
    by_source: HashMap<PathBuf, usize>,
    by_output: HashMap<PathBuf, usize>,
    by_specifier: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
    module_folders: HashMap<PathBuf, String>,
}

impl Caches {
    fn build(manifest: &ManifestRoot) -> Self {
        let mut caches = Caches::default();

        for module in manifest.modules.values() {
            caches
                .module_folders
                .insert(module.source.clone(), module.name.clone());

            for (category, entry) in module.entries() {
                let index = caches.files.len();
                let file = IndexedFile {
                    id: file_id(&module.name, &entry.path),
                    module: module.name.clone(),
                    category,
                    entry: entry.clone(),
                    source: module.source_path(entry),
                    output: module.output_path(entry),
                };

                caches.by_source.insert(file.source.clone(), index);
                caches.by_output.insert(file.output.clone(), index);
                caches.by_id.insert(file.id.clone(), index);
                for key in specifier_keys(module, entry, category) {
                    caches.by_specifier.entry(key).or_insert(index);
                }
                caches.files.push(file);
            }
        }
        caches
    }
}

/// Stable id of a module file: the module-qualified path with its last
/// separator turned into `:` and its code extension removed.
///
/// Declaration files keep their `.d` marker so `x.d.ts` and `x.ts` in one
/// folder get distinct ids.
pub fn file_id(module: &str, path: &str) -> String {
    let stem = strip_suffixes(path, &CODE_EXTENSIONS);
    let qualified = format!("{module}/{stem}");
    match qualified.rfind('/') {
        Some(at) => format!("{}:{}", &qualified[..at], &qualified[at + 1..]),
        None => qualified,
    }
}

fn strip_extension(path: &str) -> &str {
    match strip_suffixes(path, &TYPINGS_EXTENSIONS) {
        stripped if stripped.len() < path.len() => stripped,
        _ => strip_suffixes(path, &CODE_EXTENSIONS),
    }
}

fn strip_suffixes<'p>(path: &'p str, suffixes: &[&str]) -> &'p str {
    suffixes
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

/// Bare specifiers that reach an entry: as written, without extension and
/// with the compiled extension; index files also answer to their folder
fn specifier_keys(module: &ManifestModule, entry: &FileEntry, category: FolderCategory) -> Vec<String> {
    let name = &module.name;
    let mut keys = vec![format!("{name}/{}", entry.path)];
    if matches!(entry.file_type, FileType::Source | FileType::Compiled | FileType::Typings) {
        let stem = strip_extension(&entry.path);
        keys.push(format!("{name}/{stem}"));
        keys.push(format!("{name}/{}", entry.output_path()));

        if category == FolderCategory::Index {
            keys.push(name.clone());
        } else if let Some(folder) = stem.strip_suffix("/index") {
            keys.push(format!("{name}/{folder}"));
        }
    }
    keys
}

pub struct ManifestIndex {
    path: PathBuf,
    manifest: ManifestRoot,
    caches: Caches,
}

impl fmt::Debug for ManifestIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestIndex")
            .field("path", &self.path)
            .field("modules", &self.manifest.modules.len())
            .field("files", &self.caches.files.len())
            .finish()
    }
}

impl ManifestIndex {
    /// Load and index the manifest at `path`
    pub fn load(path: impl Into<PathBuf>) -> BuildResult<Self> {
        let path = path.into();
        let manifest = load_manifest(&path)?;
        Ok(Self::from_manifest(path, manifest))
    }

    /// Load the manifest of the package in `dir`
    pub fn for_package(dir: &Path, tool_folder: &Path) -> BuildResult<Self> {
        Self::load(dir.join(tool_folder).join(MANIFEST_FILE))
    }

    /// Index an in-memory manifest; `path` is where [`reset`](Self::reset) reloads it from
    pub fn from_manifest(path: impl Into<PathBuf>, manifest: ManifestRoot) -> Self {
        let caches = Caches::build(&manifest);
        debug!(files = caches.files.len(), modules = manifest.modules.len(), "manifest indexed");
        Self {
            path: path.into(),
            manifest,
            caches,
        }
    }

    /// Reload the manifest from disk and rebuild every cache
    pub fn reset(&mut self) -> BuildResult<()> {
        let manifest = load_manifest(&self.path)?;
        self.caches = Caches::build(&manifest);
        self.manifest = manifest;
        Ok(())
    }

    /// Repoint the index at the manifest a module keeps in its own tool folder
    pub fn reinit_for_module(&mut self, name: &str) -> BuildResult<()> {
        let module = self
            .manifest
            .module(name)
            .ok_or_else(|| BuildError::module_not_found(name))?;
        let path = module
            .source
            .join(&self.manifest.paths.tool)
            .join(MANIFEST_FILE);

        debug!(module = name, path = %path.display(), "reinitializing index");
        *self = Self::load(path)?;
        Ok(())
    }

    pub fn manifest(&self) -> &ManifestRoot {
        &self.manifest
    }

    pub fn manifest_path(&self) -> &Path {
        &self.path
    }

    pub fn files(&self) -> &[IndexedFile] {
        &self.caches.files
    }

    pub fn by_source(&self, path: &Path) -> Option<&IndexedFile> {
        self.lookup(self.caches.by_source.get(path))
    }

    pub fn by_output(&self, path: &Path) -> Option<&IndexedFile> {
        self.lookup(self.caches.by_output.get(path))
    }

    /// Entry reached by a bare specifier such as `@app/core/src/db`
    pub fn by_specifier(&self, specifier: &str) -> Option<&IndexedFile> {
        self.lookup(self.caches.by_specifier.get(specifier))
    }

    pub fn by_id(&self, id: &str) -> Option<&IndexedFile> {
        self.lookup(self.caches.by_id.get(id))
    }

    /// Stable id of a source file
    pub fn get_id(&self, path: &Path) -> Option<&str> {
        self.by_source(path).map(|f| f.id.as_str())
    }

    pub fn module(&self, name: &str) -> Option<&ManifestModule> {
        self.manifest.module(name)
    }

    /// Module whose source folder contains `path`
    pub fn module_for_folder(&self, path: &Path) -> Option<&ManifestModule> {
        path.ancestors()
            .find_map(|dir| self.caches.module_folders.get(dir))
            .and_then(|name| self.manifest.module(name))
    }

    /// Source files matching a query
    pub fn find(&self, config: &FindConfig<'_>) -> Vec<&IndexedFile> {
        self.caches
            .files
            .iter()
            .filter(|f| f.is_source())
            .filter(|f| config.categories.is_empty() || config.categories.contains(&f.category))
            .filter(|f| {
                self.manifest
                    .module(&f.module)
                    .is_some_and(|m| config.admits_profiles(&m.profiles))
            })
            .filter(|f| config.admits_profiles(&f.entry.profiles))
            .filter(|f| config.filter.as_ref().map_or(true, |keep| keep(&f.source)))
            .collect()
    }

    fn lookup(&self, index: Option<&usize>) -> Option<&IndexedFile> {
        index.and_then(|i| self.caches.files.get(*i))
    }

    /// Resolve a path without extension (or with any known one) to a file or folder index
    fn resolve_path(&self, base: &Path) -> Option<(ReferenceKind, &IndexedFile)> {
        if let Some(file) = self.by_source(base) {
            return Some((ReferenceKind::File, file));
        }

        let raw = base.to_string_lossy();
        let stem = strip_extension(&raw);
        let file = SOURCE_EXTENSIONS
            .iter()
            .find_map(|ext| self.by_source(Path::new(&format!("{stem}{ext}"))));
        if let Some(file) = file {
            return Some((ReferenceKind::File, file));
        }

        SOURCE_EXTENSIONS
            .iter()
            .find_map(|ext| self.by_source(&base.join(format!("index{ext}"))))
            .map(|file| (ReferenceKind::Directory, file))
    }

    fn resolve_bare(&self, specifier: &str) -> Option<(ReferenceKind, &IndexedFile)> {
        let file = self.by_specifier(specifier)?;
        let folder_index = self.manifest.modules.contains_key(specifier)
            || strip_extension(&file.entry.path).ends_with("/index")
                && !specifier.ends_with("/index")
                && !specifier.contains("/index.");
        let kind = if folder_index {
            ReferenceKind::Directory
        } else {
            ReferenceKind::File
        };
        Some((kind, file))
    }
}

impl ReferenceResolver for ManifestIndex {
    fn id_of(&self, source: &Path) -> Option<String> {
        self.get_id(source).map(str::to_string)
    }

    fn resolve_reference(&self, from: &Path, specifier: &str) -> Option<ResolvedReference> {
        let (kind, file) = if is_relative(specifier) {
            let dir = from.parent().unwrap_or_else(|| Path::new(""));
            self.resolve_path(&normalize(&dir.join(specifier)))?
        } else {
            self.resolve_bare(specifier)?
        };
        Some(ResolvedReference {
            path: file.source.clone(),
            kind,
            project: Some(file.module.clone()),
        })
    }

    fn locate(&self, source: &Path) -> Option<UnitLocation> {
        self.by_source(source).map(|file| UnitLocation {
            module: file.module.clone(),
            category: file.category.name().to_string(),
            compile_time_only: file.category.is_compile_time_only(),
        })
    }
}
