//! Transitive package dependency discovery
//!
//! Walks package descriptors depth-first with an explicit stack, starting at
//! the workspace root. Only workspace-local packages and packages carrying
//! `loom` metadata join the graph; anything else is pruned together with its
//! subtree.

use crate::descriptor::PackageDescriptor;
use crate::graph::{edge_roles, DependencyKind, GraphNode, ModuleGraph};
use crate::role::Role;
use crate::workspace::WorkspaceMembers;
use crate::{PackageResult, DESCRIPTOR_FILE};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Framework scope; packages under it are toolchain-internal
pub const INTERNAL_SCOPE: &str = "@loom/";

/// Discover and settle the module graph of the workspace at `root`
pub fn resolve_workspace(root: &Path) -> PackageResult<ModuleGraph> {
    let mut graph = DependencyVisitor::new(root)?.visit()?;
    graph.complete()?;
    Ok(graph)
}

/// One pending visit
struct Frame {
    dir: PathBuf,
    parent: Option<(String, DependencyKind)>,
    inherited: BTreeSet<Role>,
}

/// Depth-first dependency visitor
pub struct DependencyVisitor {
    /// Workspace root folder
    root: PathBuf,
    /// Root descriptor
    root_descriptor: PackageDescriptor,
    /// Monorepo members
    members: WorkspaceMembers,
    /// Descriptors already read, by folder
    descriptors: HashMap<PathBuf, PackageDescriptor>,
    /// Packages rejected from the graph
    pruned: HashSet<String>,
}

impl DependencyVisitor {
    /// Prepare a visitor for the workspace at `root`
    pub fn new(root: impl AsRef<Path>) -> PackageResult<Self> {
        let root = root.as_ref().to_path_buf();
        let root_descriptor = PackageDescriptor::load(&root)?;
        let members = WorkspaceMembers::discover(&root, &root_descriptor)?;
        Ok(Self {
            root,
            root_descriptor,
            members,
            descriptors: HashMap::new(),
            pruned: HashSet::new(),
        })
    }

    /// Workspace members found while preparing the visit
    pub fn members(&self) -> &WorkspaceMembers {
        &self.members
    }

    /// Walk the dependency tree. The returned graph is not yet completed.
    pub fn visit(mut self) -> PackageResult<ModuleGraph> {
        let root_name = self.root_descriptor.name_or(&self.root);
        let root_node = self.node_for(&self.root_descriptor.clone(), &self.root, true);
        let mut graph = ModuleGraph::new(root_node);
        if let Some(node) = graph.get_mut(&root_name) {
            node.roles = BTreeSet::from([Role::Standard]);
        }

        let mut stack = Vec::new();
        let root_descriptor = self.root_descriptor.clone();
        let root_dir = self.root.clone();
        self.push_children(&mut stack, &root_descriptor, &root_dir, &root_name, true, &graph);

        while let Some(frame) = stack.pop() {
            let descriptor = self.descriptor(&frame.dir)?;
            let name = descriptor.name_or(&frame.dir);

            if graph.contains(&name) {
                if let Some((parent, kind)) = &frame.parent {
                    graph.add_edge(parent, &name, *kind)?;
                }
                if let Some(node) = graph.get_mut(&name) {
                    if node.inherit_roles && !node.role_root {
                        node.roles.extend(frame.inherited.iter().copied());
                    }
                }
                continue;
            }

            if self.pruned.contains(&name) {
                continue;
            }

            let workspace = self.members.contains_dir(&frame.dir);
            if !workspace && !descriptor.is_framework_package() {
                debug!(package = %name, "pruning third-party package");
                self.pruned.insert(name);
                continue;
            }

            let mut node = self.node_for(&descriptor, &frame.dir, false);
            node.roles = transient_roles(&node, &frame.inherited);
            graph.add_node(node);
            if let Some((parent, kind)) = &frame.parent {
                graph.add_edge(parent, &name, *kind)?;
            }

            self.push_children(&mut stack, &descriptor, &frame.dir, &name, false, &graph);
        }

        debug!(modules = graph.len(), pruned = self.pruned.len(), "dependency visit finished");
        Ok(graph)
    }

    /// Queue the dependencies of a visited package, first name on top
    fn push_children(
        &self,
        stack: &mut Vec<Frame>,
        descriptor: &PackageDescriptor,
        dir: &Path,
        name: &str,
        main: bool,
        graph: &ModuleGraph,
    ) {
        let parent_roles = graph
            .get(name)
            .map(|n| n.roles.clone())
            .unwrap_or_default();

        let mut children: Vec<(&String, DependencyKind)> = Vec::new();
        children.extend(
            descriptor
                .dependencies
                .keys()
                .map(|d| (d, DependencyKind::Production)),
        );
        children.extend(
            descriptor
                .peer_dependencies
                .keys()
                .map(|d| (d, DependencyKind::Peer)),
        );
        if main {
            children.extend(
                descriptor
                    .dev_dependencies
                    .keys()
                    .map(|d| (d, DependencyKind::Development)),
            );
        }
        children.sort();

        for (dep, kind) in children.into_iter().rev() {
            match self.resolve_package_dir(dir, dep) {
                Some(child_dir) => stack.push(Frame {
                    dir: child_dir,
                    parent: Some((name.to_string(), kind)),
                    inherited: edge_roles(&parent_roles, kind),
                }),
                None if kind == DependencyKind::Peer => {}
                None => warn!(package = %name, dependency = %dep, "dependency is not installed"),
            }
        }
    }

    /// Locate a dependency: workspace members first, then `node_modules` upwards
    fn resolve_package_dir(&self, from: &Path, name: &str) -> Option<PathBuf> {
        if let Some(dir) = self.members.get(name) {
            return Some(dir.to_path_buf());
        }
        from.ancestors()
            .map(|dir| dir.join("node_modules").join(name))
            .find(|candidate| candidate.join(DESCRIPTOR_FILE).is_file())
    }

    /// Read (or reuse) the descriptor of a package folder
    fn descriptor(&mut self, dir: &Path) -> PackageResult<PackageDescriptor> {
        if let Some(desc) = self.descriptors.get(dir) {
            return Ok(desc.clone());
        }
        let desc = PackageDescriptor::load(dir)?;
        self.descriptors.insert(dir.to_path_buf(), desc.clone());
        Ok(desc)
    }

    fn node_for(&self, descriptor: &PackageDescriptor, dir: &Path, main: bool) -> GraphNode {
        let name = descriptor.name_or(dir);
        let meta = descriptor.loom.clone().unwrap_or_default();
        let workspace = main || self.members.contains_dir(dir);

        let mut node = GraphNode::new(name.clone(), dir)
            .with_roles(meta.roles.iter().copied())
            .with_inherit_roles(meta.inherit_roles);
        node.version = descriptor.version().to_string();
        node.workspace = workspace;
        node.main = main;
        node.internal = meta.internal || name.starts_with(INTERNAL_SCOPE);
        node.role_root = main || workspace || meta.role_root;
        node.profiles = meta.profiles;
        node.file_profiles = meta.file_profiles;
        node
    }
}

/// Roles a freshly discovered node carries until the completion pass runs
fn transient_roles(node: &GraphNode, inherited: &BTreeSet<Role>) -> BTreeSet<Role> {
    if node.role_root {
        return BTreeSet::from([Role::Standard]);
    }
    let mut roles = node.declared_roles.clone();
    if node.inherit_roles {
        roles.extend(inherited.iter().copied());
    }
    if roles.is_empty() {
        roles.insert(Role::Standard);
    }
    roles
}
