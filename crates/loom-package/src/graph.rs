//! Module dependency graph and the completion pass that settles `prod` and roles
use crate::role::Role;
use crate::{PackageError, PackageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::debug;

/// Kind of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Production,
    Development,
    Peer,
}

/// A dependency edge from a parent to one of its dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub name: String,
    pub kind: DependencyKind,
}

/// A module in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Package name (unique key)
    pub name: String,
    /// Package version
    pub version: String,
    /// Package folder
    pub dir: PathBuf,
    /// The workspace root package
    pub main: bool,
    /// Lives inside the workspace (root or monorepo member)
    pub workspace: bool,
    /// Part of the framework toolchain
    pub internal: bool,
    /// Shipped to production
    pub prod: bool,
    /// Effective roles (settled by [`ModuleGraph::complete`])
    pub roles: BTreeSet<Role>,
    /// Roles the package declares for itself
    pub declared_roles: BTreeSet<Role>,
    /// Whether roles of dependents flow into this node
    pub inherit_roles: bool,
    /// Boundary where role inheritance starts
    pub role_root: bool,
    /// Names of modules depending on this one
    pub parents: BTreeSet<String>,
    /// Outgoing edges to other graph members
    pub dependencies: Vec<Edge>,
    /// Profiles gating the whole module
    pub profiles: Vec<String>,
    /// Profiles gating files, keyed by relative path prefix
    pub file_profiles: BTreeMap<String, Vec<String>>,
}

impl GraphNode {
    /// Create a plain inheriting node
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: "0.0.0".to_string(),
            dir: dir.into(),
            main: false,
            workspace: false,
            internal: false,
            prod: false,
            roles: BTreeSet::new(),
            declared_roles: BTreeSet::new(),
            inherit_roles: true,
            role_root: false,
            parents: BTreeSet::new(),
            dependencies: Vec::new(),
            profiles: Vec::new(),
            file_profiles: BTreeMap::new(),
        }
    }

    /// Mark as the workspace root
    pub fn as_main(mut self) -> Self {
        self.main = true;
        self.workspace = true;
        self.role_root = true;
        self
    }

    /// Mark as a role root
    pub fn as_role_root(mut self) -> Self {
        self.role_root = true;
        self
    }

    /// Set declared roles
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.declared_roles = roles.into_iter().collect();
        self
    }

    /// Set whether dependents' roles flow into this node
    pub fn with_inherit_roles(mut self, inherit: bool) -> Self {
        self.inherit_roles = inherit;
        self
    }

    /// Edge kind to a dependency, if any
    pub fn edge_to(&self, name: &str) -> Option<DependencyKind> {
        self.dependencies
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.kind)
    }
}

/// Roles carried across an edge
pub(crate) fn edge_roles(parent_roles: &BTreeSet<Role>, kind: DependencyKind) -> BTreeSet<Role> {
    match kind {
        DependencyKind::Development => BTreeSet::from([Role::Test]),
        DependencyKind::Production | DependencyKind::Peer => parent_roles.clone(),
    }
}

/// Dependency graph of the modules a workspace is made of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleGraph {
    /// Name of the workspace root module
    root: String,
    /// Modules by name
    nodes: BTreeMap<String, GraphNode>,
    /// Discovery order
    order: Vec<String>,
}

impl ModuleGraph {
    /// Create a graph holding only its root
    pub fn new(root: GraphNode) -> Self {
        let name = root.name.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(name.clone(), root);
        Self {
            root: name.clone(),
            nodes,
            order: vec![name],
        }
    }

    /// Add a module; an existing module with the same name is kept
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.name) {
            return false;
        }
        self.order.push(node.name.clone());
        self.nodes.insert(node.name.clone(), node);
        true
    }

    /// Record `parent -> child`. A production edge wins over other kinds.
    pub fn add_edge(&mut self, parent: &str, child: &str, kind: DependencyKind) -> PackageResult<()> {
        if parent == child {
            return Ok(());
        }
        if !self.nodes.contains_key(child) {
            return Err(PackageError::UnknownModule(child.to_string()));
        }
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| PackageError::UnknownModule(parent.to_string()))?;
        match parent_node.dependencies.iter_mut().find(|e| e.name == child) {
            Some(edge) => {
                if kind == DependencyKind::Production {
                    edge.kind = kind;
                }
            }
            None => parent_node.dependencies.push(Edge {
                name: child.to_string(),
                kind,
            }),
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parents.insert(parent.to_string());
        }
        Ok(())
    }

    /// Root module name
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(name)
    }

    /// Whether a module is part of the graph
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Modules in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|name| self.nodes.get(name))
    }

    /// Module count
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Settle `prod` and roles top-down.
    ///
    /// A module is processed once all of its recorded parents are processed.
    /// When unprocessed modules remain and none of them is ready, the graph
    /// has a cycle and every unresolved module is reported. Role roots end
    /// with exactly `{standard}`.
    pub fn complete(&mut self) -> PackageResult<()> {
        let mut remaining: BTreeMap<String, BTreeSet<String>> = self
            .nodes
            .values()
            .map(|node| {
                let parents = if node.main {
                    BTreeSet::new()
                } else {
                    node.parents
                        .iter()
                        .filter(|p| self.nodes.contains_key(*p))
                        .cloned()
                        .collect()
                };
                (node.name.clone(), parents)
            })
            .collect();

        while !remaining.is_empty() {
            let ready: Vec<String> = remaining
                .iter()
                .filter(|(_, parents)| parents.is_empty())
                .map(|(name, _)| name.clone())
                .collect();

            if ready.is_empty() {
                return Err(PackageError::CircularDependency {
                    unresolved: remaining.into_keys().collect(),
                });
            }

            for name in ready {
                remaining.remove(&name);
                self.settle(&name);
                let children: Vec<String> = self.nodes[&name]
                    .dependencies
                    .iter()
                    .map(|e| e.name.clone())
                    .collect();
                for child in children {
                    if let Some(parents) = remaining.get_mut(&child) {
                        parents.remove(&name);
                    }
                }
            }
        }

        for node in self.nodes.values_mut() {
            if node.role_root {
                node.roles = BTreeSet::from([Role::Standard]);
            }
        }

        Ok(())
    }

    /// Compute `prod` and roles of one module from its settled parents
    fn settle(&mut self, name: &str) {
        let node = &self.nodes[name];
        if node.main {
            if let Some(node) = self.nodes.get_mut(name) {
                node.prod = true;
                node.roles = BTreeSet::from([Role::Standard]);
            }
            return;
        }

        let mut prod = false;
        let mut roles = node.declared_roles.clone();
        for parent_name in &node.parents {
            let Some(parent) = self.nodes.get(parent_name) else {
                continue;
            };
            let Some(kind) = parent.edge_to(name) else {
                continue;
            };
            if parent.prod && kind == DependencyKind::Production {
                prod = true;
            }
            if node.inherit_roles && !node.role_root {
                roles.extend(edge_roles(&parent.roles, kind));
            }
        }
        if node.role_root || roles.is_empty() {
            roles = BTreeSet::from([Role::Standard]);
        }

        debug!(module = %name, prod, roles = ?roles, "settled module");
        if let Some(node) = self.nodes.get_mut(name) {
            node.prod = prod;
            node.roles = roles;
        }
    }
}
