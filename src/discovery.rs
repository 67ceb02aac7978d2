//! Service discovery and dependency resolution
//!
//! The discovery walk descends a directory tree depth-first, pre-order,
//! carrying two pieces of context per frame: the cumulative ignore set and
//! the nearest enclosing service. A genuine `service.yaml` starts a new
//! service; bare `Dockerfile`s and loose files attach to the nearest
//! enclosing one. Everything found lands in an insertion-ordered registry
//! where the first service to claim a name wins.
//!
//! The traversal uses an explicit worklist rather than recursion, so depth
//! is bounded by memory and each level is testable in isolation.
//!
//! Dependency resolution computes a transitive closure over `requires`
//! declarations. A name missing from the registry is looked up on the
//! requesting service's profile search path, then in (or via a fresh
//! shallow clone into) the `.forge` state directory. Unresolvable names
//! are aggregated and reported together; nothing proceeds partially.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ForgeConfig;
use crate::descriptor::{classify_file, DescriptorError, DESCRIPTOR_NAME};
use crate::git::{find_git_root, sibling_remote_url, GitAdapter, GitError};
use crate::ignore_rules::{IgnoreError, IgnoreSet};
use crate::service::{Service, ServiceError};

/// File name marking a bare container build unit.
pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Directory under the forge root holding remote dependency clones.
pub const STATE_DIR: &str = ".forge";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no such directory: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to list {}: {source}", .path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Ignore(#[from] IgnoreError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("required service(s) missing: {}", .names.join(", "))]
    Missing { names: Vec<String> },

    #[error("unknown target service: {0}")]
    UnknownTarget(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Name-addressed service registry, insertion-ordered.
///
/// Grows monotonically over a discovery context's lifetime; registration
/// never displaces an existing name.
#[derive(Debug, Default)]
pub struct Registry {
    services: Vec<Arc<Service>>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Registers `service` unless its name is taken. Returns whether the
    /// service was registered.
    fn register(&mut self, service: Arc<Service>) -> bool {
        if self.by_name.contains_key(service.name()) {
            return false;
        }
        self.by_name
            .insert(service.name().to_string(), self.services.len());
        self.services.push(service);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Service>> {
        self.by_name.get(name).map(|&idx| &self.services[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered services in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Service>> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// One pending traversal frame.
struct Frame {
    dir: PathBuf,
    enclosing: Option<Arc<Service>>,
    ignores: IgnoreSet,
}

/// Discovery engine: walks directory trees and maintains the registry.
pub struct Discovery {
    config: Arc<ForgeConfig>,
    git: GitAdapter,
    registry: Registry,
}

impl Discovery {
    pub fn new(config: ForgeConfig) -> Self {
        let git = GitAdapter::new(config.git_timeout);
        Self {
            config: Arc::new(config),
            git,
            registry: Registry::default(),
        }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Walks `directory` and returns every discovered service, including
    /// ones whose name was already registered (duplicates are visible to
    /// the caller but not re-registered).
    pub fn search(&mut self, directory: &Path) -> Result<Vec<Arc<Service>>, DiscoveryError> {
        self.search_with(directory, false)
    }

    /// Like [`Discovery::search`], but marks discovered services shallow
    /// (found via remote-fetch resolution, non-authoritative).
    pub fn search_shallow(
        &mut self,
        directory: &Path,
    ) -> Result<Vec<Arc<Service>>, DiscoveryError> {
        self.search_with(directory, true)
    }

    fn search_with(
        &mut self,
        directory: &Path,
        shallow: bool,
    ) -> Result<Vec<Arc<Service>>, DiscoveryError> {
        if !directory.exists() {
            return Err(DiscoveryError::PathNotFound(directory.to_path_buf()));
        }
        if !directory.is_dir() {
            return Err(DiscoveryError::NotADirectory(directory.to_path_buf()));
        }
        let walk_root = directory
            .canonicalize()
            .map_err(|_| DiscoveryError::PathNotFound(directory.to_path_buf()))?;

        debug!(root = %walk_root.display(), shallow, "starting discovery walk");

        // Ignore files between the enclosing git root and the walk root
        // apply before anything local.
        let scope_root = find_git_root(&walk_root).unwrap_or_else(|| walk_root.clone());
        let base_ignores = IgnoreSet::base(&walk_root, &scope_root)?;

        let mut found = Vec::new();
        let mut stack = vec![Frame {
            dir: walk_root.clone(),
            enclosing: None,
            ignores: base_ignores,
        }];

        while let Some(frame) = stack.pop() {
            // Tolerate directories vanishing mid-walk.
            if !frame.dir.exists() {
                continue;
            }

            let ignores = frame.ignores.with_dir(&frame.dir)?;
            let matcher = ignores.matcher(&walk_root)?;

            let mut children = match list_children(&frame.dir) {
                Ok(children) => children,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(DiscoveryError::ReadDir {
                        path: frame.dir.clone(),
                        source,
                    })
                }
            };
            children.retain(|child| {
                let rel = child
                    .path
                    .strip_prefix(&walk_root)
                    .unwrap_or(&child.path);
                !matcher.is_ignored(rel, child.is_dir)
            });

            let mut enclosing = frame.enclosing.clone();

            if let Some(candidate) = children
                .iter()
                .find(|c| !c.is_dir && c.name == DESCRIPTOR_NAME)
            {
                if classify_file(&candidate.path)? {
                    let service = Arc::new(Service::discover(
                        self.config.clone(),
                        self.git.clone(),
                        candidate.path.clone(),
                        shallow,
                    )?);
                    if self.registry.register(service.clone()) {
                        info!(name = %service.name(), root = %service.root().display(), "discovered service");
                    } else {
                        debug!(name = %service.name(), root = %service.root().display(), "duplicate service name, keeping first registration");
                    }
                    found.push(service.clone());
                    enclosing = Some(service);
                } else {
                    debug!(path = %candidate.path.display(), "kubernetes manifest, not a service descriptor");
                }
            }

            if let Some(service) = &enclosing {
                if let Some(dockerfile) = children
                    .iter()
                    .find(|c| !c.is_dir && c.name == DOCKERFILE_NAME)
                {
                    if let Ok(rel) = dockerfile.path.strip_prefix(service.root()) {
                        service.add_dockerfile(rel.to_string_lossy().into_owned());
                    }
                }
            }

            // Non-directory children attach to the enclosing service;
            // directories are pushed in reverse so they pop in sorted
            // order.
            for child in &children {
                if child.is_dir {
                    continue;
                }
                if let Some(service) = &enclosing {
                    if let Ok(rel) = child.path.strip_prefix(service.root()) {
                        service.add_file(rel.to_string_lossy().into_owned());
                    }
                }
            }
            for child in children.iter().rev() {
                if child.is_dir {
                    stack.push(Frame {
                        dir: child.path.clone(),
                        enclosing: enclosing.clone(),
                        ignores: ignores.clone(),
                    });
                }
            }
        }

        debug!(found = found.len(), registered = self.registry.len(), "discovery walk finished");
        Ok(found)
    }

    /// Computes the transitive dependency closure for `targets`.
    ///
    /// Returns the dependency names that are not themselves targets, in
    /// first-encounter order. Fails with [`ResolveError::Missing`] naming
    /// every dependency that stayed unresolved after exhausting the search
    /// path and remote fetch.
    pub fn dependencies(&mut self, targets: &[String]) -> Result<Vec<String>, ResolveError> {
        let mut todo = Vec::with_capacity(targets.len());
        for target in targets {
            let service = self
                .registry
                .get(target)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownTarget(target.clone()))?;
            todo.push(service);
        }
        let Some(root) = todo.first().cloned() else {
            return Ok(Vec::new());
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut added: Vec<String> = Vec::new();
        let mut missing: Vec<String> = Vec::new();

        while let Some(service) = todo.pop() {
            if !visited.insert(service.name().to_string()) {
                continue;
            }
            for dep in service.requires() {
                if !self.registry.contains(dep)
                    && !self.resolve(&root, dep)?
                    && !missing.iter().any(|m| m == dep)
                {
                    missing.push(dep.clone());
                }
                if !targets.iter().any(|t| t == dep) && !added.iter().any(|a| a == dep) {
                    added.push(dep.clone());
                }
                if let Some(resolved) = self.registry.get(dep) {
                    todo.push(resolved.clone());
                }
            }
        }

        if missing.is_empty() {
            Ok(added)
        } else {
            Err(ResolveError::Missing { names: missing })
        }
    }

    /// Attempts to bring `dep` into the registry on behalf of `root`:
    /// profile search path first, then the `.forge` clone cache, then a
    /// shallow clone of the sibling remote repository.
    fn resolve(&mut self, root: &Arc<Service>, dep: &str) -> Result<bool, ResolveError> {
        let profile = root.profile();
        let search_path = self.config.profile_config(&profile).search_path.clone();
        for entry in search_path {
            let path = self.config.base.join(entry);
            if !path.exists() {
                debug!(path = %path.display(), "search path entry does not exist");
                continue;
            }
            let found = self.search(&path)?;
            if found.iter().any(|s| s.name() == dep) {
                return Ok(true);
            }
        }

        let target = root.forge_root().join(STATE_DIR).join(dep);
        if !target.exists() {
            let Some(url) = self.git.remote_url(root.root()) else {
                debug!(dep, "no remote url, cannot derive sibling repository");
                return Ok(false);
            };
            let remote = sibling_remote_url(&url, dep);
            if !self.git.remote_exists(&remote) {
                warn!(dep, remote = %remote, "sibling repository does not exist");
                return Ok(false);
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| {
                    DiscoveryError::ReadDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
            self.git.clone_shallow(&remote, &target)?;
        }

        let found = self.search_shallow(&target)?;
        Ok(found.iter().any(|s| s.name() == dep))
    }
}

struct Child {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

/// Lists immediate children sorted by name. Entries whose type cannot be
/// determined (racing deletion) are skipped.
fn list_children(dir: &Path) -> io::Result<Vec<Child>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = path.is_dir();
        children.push(Child { name, path, is_dir });
    }
    children.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(children)
}
