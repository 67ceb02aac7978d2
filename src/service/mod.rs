//! Service model
//!
//! A [`Service`] is one discovered deployable unit: the directory holding a
//! `service.yaml` descriptor plus everything the discovery walk attributed
//! to it (loose files and bare Dockerfiles). Identity is the descriptor
//! name, falling back to the directory basename.
//!
//! The file and Dockerfile lists are accumulated while discovery is inside
//! the service's subtree and are effectively frozen afterwards; the version
//! is computed once on first request and cached for the service's lifetime.

mod container;

pub use container::Container;

use glob::Pattern;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;
use tracing::debug;

use crate::config::{ForgeConfig, DEFAULT_PROFILE};
use crate::descriptor::{load_descriptor, ServiceDescriptor, DESCRIPTOR_NAME};
use crate::git::{find_git_root, GitAdapter, GitError};
use crate::version::{self, VersionError};
use crate::util::search_parents_outermost;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Descriptor(#[from] crate::descriptor::DescriptorError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("failed to serialize service metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// One discovered deployable unit.
#[derive(Debug)]
pub struct Service {
    config: Arc<ForgeConfig>,
    git: GitAdapter,
    descriptor_path: PathBuf,
    root: PathBuf,
    descriptor: ServiceDescriptor,
    name: String,
    branch: Option<String>,
    git_root: Option<PathBuf>,
    forge_root: PathBuf,
    shallow: bool,
    files: Mutex<Vec<String>>,
    dockerfiles: Mutex<Vec<String>>,
    version: OnceLock<String>,
}

impl Service {
    /// Constructs a service from a genuine descriptor found at
    /// `descriptor_path`. Called by the discovery walk.
    pub fn discover(
        config: Arc<ForgeConfig>,
        git: GitAdapter,
        descriptor_path: PathBuf,
        shallow: bool,
    ) -> Result<Self, ServiceError> {
        let root = descriptor_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let descriptor = load_descriptor(&descriptor_path, &config.env)?;

        let git_root = find_git_root(&root);
        let branch = config.branch.clone().or_else(|| {
            if git_root.is_some() {
                git.current_branch(&root)
            } else {
                None
            }
        });
        let forge_root =
            search_parents_outermost(DESCRIPTOR_NAME, &root).unwrap_or_else(|| root.clone());
        let name = descriptor.name.clone().unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Ok(Self {
            config,
            git,
            descriptor_path,
            root,
            descriptor,
            name,
            branch,
            git_root,
            forge_root,
            shallow,
            files: Mutex::new(Vec::new()),
            dockerfiles: Mutex::new(Vec::new()),
            version: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory containing the descriptor.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Branch in effect: config override, else detected VCS branch.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Dependency names declared by the descriptor, in order.
    pub fn requires(&self) -> &[String] {
        &self.descriptor.requires
    }

    /// True when this service came from a remote-fetch resolution rather
    /// than the primary local walk.
    pub fn shallow(&self) -> bool {
        self.shallow
    }

    pub fn git_root(&self) -> Option<&Path> {
        self.git_root.as_deref()
    }

    /// The outermost ancestor directory that is itself a service root; the
    /// `.forge` state directory for remote clones lives under it.
    pub fn forge_root(&self) -> &Path {
        &self.forge_root
    }

    pub(crate) fn add_file(&self, rel_path: String) {
        self.files.lock().expect("files lock").push(rel_path);
    }

    pub(crate) fn add_dockerfile(&self, rel_path: String) {
        self.dockerfiles
            .lock()
            .expect("dockerfiles lock")
            .push(rel_path);
    }

    /// Relative paths of all files attributed to this service, in recorded
    /// walk order.
    pub fn files(&self) -> Vec<String> {
        self.files.lock().expect("files lock").clone()
    }

    /// Relative paths of bare Dockerfiles found without explicit container
    /// entries.
    pub fn dockerfiles(&self) -> Vec<String> {
        self.dockerfiles.lock().expect("dockerfiles lock").clone()
    }

    /// The service version, computed once and cached.
    pub fn version(&self) -> Result<String, VersionError> {
        if let Some(cached) = self.version.get() {
            return Ok(cached.clone());
        }
        let computed = version::compute(&self.root, &self.files(), &self.git)?;
        Ok(self.version.get_or_init(|| computed).clone())
    }

    /// Profile selected for this service: explicit override, else the first
    /// descriptor branch-glob matching the branch, else "default". A `"*"`
    /// entry matches when there is no branch.
    pub fn profile(&self) -> String {
        if let Some(profile) = &self.config.profile {
            return profile.clone();
        }
        match &self.branch {
            Some(branch) => {
                for (pattern, profile) in &self.descriptor.branches {
                    let matched = match Pattern::new(pattern) {
                        Ok(p) => p.matches(branch),
                        Err(_) => pattern == branch,
                    };
                    if matched {
                        return profile.clone();
                    }
                }
            }
            None => {
                for (pattern, profile) in &self.descriptor.branches {
                    if pattern == "*" {
                        return profile.clone();
                    }
                }
            }
        }
        DEFAULT_PROFILE.to_string()
    }

    /// Image name for a dockerfile of this service: the service name plus
    /// the dockerfile's directory prefix, slashes flattened to dashes.
    pub fn image(&self, dockerfile: &str) -> String {
        let prefix = Path::new(dockerfile)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.name, prefix)
        };
        name.replace('/', "-")
    }

    /// Full image reference including the profile's registry prefix.
    pub fn image_ref(&self, image: &str, version: &str) -> String {
        let profile = self.profile();
        match &self.config.profile_config(&profile).registry {
            Some(registry) => format!("{}/{}:{}", registry, image, version),
            None => format!("{}:{}", image, version),
        }
    }

    /// Container build units: descriptor entries when declared, otherwise
    /// one per collected bare Dockerfile.
    pub fn containers(&self) -> Vec<Container<'_>> {
        if !self.descriptor.containers.is_empty() {
            self.descriptor
                .containers
                .iter()
                .enumerate()
                .map(|(index, spec)| Container::from_spec(self, spec.clone(), index))
                .collect()
        } else {
            self.dockerfiles()
                .into_iter()
                .enumerate()
                .map(|(index, dockerfile)| Container::from_dockerfile(self, dockerfile, index))
                .collect()
        }
    }

    /// Directory of source manifests.
    pub fn manifest_dir(&self) -> PathBuf {
        self.root.join("k8s")
    }

    /// Directory rendered manifests are written to.
    pub fn manifest_target_dir(&self) -> PathBuf {
        self.root.join(".forge").join("k8s").join(&self.name)
    }

    /// For shallow git-backed services, refreshes the underlying clone once
    /// per git root per run (`pulled` carries the per-run state).
    pub fn pull(&self, pulled: &mut HashSet<PathBuf>) -> Result<(), GitError> {
        if !self.shallow {
            return Ok(());
        }
        let Some(git_root) = &self.git_root else {
            return Ok(());
        };
        if pulled.insert(git_root.clone()) {
            debug!(root = %git_root.display(), "updating shallow clone");
            self.git.pull_shallow(git_root)?;
        }
        Ok(())
    }

    /// Templating/reporting metadata: the environment snapshot, descriptor,
    /// and build facts (branch, version, profile, image references keyed by
    /// both dockerfile and image name).
    pub fn build_metadata(&self) -> Result<serde_json::Value, ServiceError> {
        let version = self.version()?;
        let profile_name = self.profile();

        let mut descriptor = serde_json::to_value(&self.descriptor.raw)?;
        if let Some(map) = descriptor.as_object_mut() {
            map.entry("name").or_insert_with(|| json!(self.name));
        }

        let mut profile = descriptor
            .get("profiles")
            .and_then(|p| p.get(&profile_name))
            .cloned()
            .unwrap_or_else(|| json!({}));
        if let Some(map) = profile.as_object_mut() {
            map.entry("name").or_insert_with(|| json!(profile_name));
        }

        let mut images = serde_json::Map::new();
        for container in self.containers() {
            let reference = self.image_ref(&container.image(), &version);
            images.insert(container.dockerfile.clone(), json!(reference));
            images.insert(container.image(), json!(reference));
        }

        Ok(json!({
            "env": self.config.env,
            "service": descriptor,
            "build": {
                "branch": self.branch,
                "version": version,
                "profile": profile,
                "name": format!("{}-{}", self.name, profile_name),
                "images": images,
            },
        }))
    }

    /// Reporting summary for external consumers.
    pub fn summary(&self) -> Result<serde_json::Value, ServiceError> {
        Ok(json!({
            "name": self.name,
            "owner": self.name,
            "version": self.version()?,
            "descriptor": serde_json::to_value(&self.descriptor.raw)?,
            "tasks": [],
        }))
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn service_with(descriptor: &str) -> (TempDir, Arc<Service>) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("web");
        fs::create_dir(&root).unwrap();
        fs::write(root.join(DESCRIPTOR_NAME), descriptor).unwrap();
        let config = Arc::new(ForgeConfig::new(dir.path()));
        let svc = Service::discover(
            config,
            GitAdapter::default(),
            root.join(DESCRIPTOR_NAME),
            false,
        )
        .unwrap();
        (dir, Arc::new(svc))
    }

    #[test]
    fn test_name_from_descriptor() {
        let (_dir, svc) = service_with("name: frontend\n");
        assert_eq!(svc.name(), "frontend");
    }

    #[test]
    fn test_name_falls_back_to_directory() {
        let (_dir, svc) = service_with("requires: []\n");
        assert_eq!(svc.name(), "web");
    }

    #[test]
    fn test_version_cached() {
        let (dir, svc) = service_with("name: web\n");
        fs::write(dir.path().join("web/app.py"), "print()").unwrap();
        svc.add_file("app.py".to_string());

        let first = svc.version().unwrap();
        // Mutating the tree afterwards must not change the cached value.
        fs::write(dir.path().join("web/app.py"), "changed").unwrap();
        let second = svc.version().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_profile_branch_glob() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("web");
        fs::create_dir(&root).unwrap();
        fs::write(
            root.join(DESCRIPTOR_NAME),
            "branches:\n  \"release/*\": stable\n  \"*\": dev\n",
        )
        .unwrap();

        let mut config = ForgeConfig::new(dir.path());
        config.branch = Some("release/1.4".to_string());
        let svc = Service::discover(
            Arc::new(config),
            GitAdapter::default(),
            root.join(DESCRIPTOR_NAME),
            false,
        )
        .unwrap();
        assert_eq!(svc.profile(), "stable");
    }

    #[test]
    fn test_profile_star_matches_no_branch() {
        let (_dir, svc) = service_with("branches:\n  \"*\": dev\n");
        assert_eq!(svc.branch(), None);
        assert_eq!(svc.profile(), "dev");
    }

    #[test]
    fn test_profile_defaults_without_match() {
        let (_dir, svc) = service_with("branches:\n  \"release/*\": stable\n");
        assert_eq!(svc.profile(), DEFAULT_PROFILE);
    }

    #[test]
    fn test_profile_override_short_circuits() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("web");
        fs::create_dir(&root).unwrap();
        fs::write(root.join(DESCRIPTOR_NAME), "branches:\n  \"*\": dev\n").unwrap();

        let mut config = ForgeConfig::new(dir.path());
        config.profile = Some("canary".to_string());
        let svc = Service::discover(
            Arc::new(config),
            GitAdapter::default(),
            root.join(DESCRIPTOR_NAME),
            false,
        )
        .unwrap();
        assert_eq!(svc.profile(), "canary");
    }

    #[test]
    fn test_image_naming() {
        let (_dir, svc) = service_with("name: web\n");
        assert_eq!(svc.image("Dockerfile"), "web");
        assert_eq!(svc.image("api/Dockerfile"), "web-api");
        assert_eq!(svc.image("api/v2/Dockerfile"), "web-api-v2");
    }

    #[test]
    fn test_containers_derived_from_dockerfiles() {
        let (_dir, svc) = service_with("name: web\n");
        svc.add_dockerfile("Dockerfile".to_string());
        svc.add_dockerfile("worker/Dockerfile".to_string());

        let containers = svc.containers();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].image(), "web");
        assert_eq!(containers[1].image(), "web-worker");
    }

    #[test]
    fn test_containers_from_descriptor_win_over_dockerfiles() {
        let (_dir, svc) = service_with("name: web\ncontainers:\n  - custom/Dockerfile\n");
        svc.add_dockerfile("Dockerfile".to_string());

        let containers = svc.containers();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].dockerfile, "custom/Dockerfile");
    }

    #[test]
    fn test_summary_shape() {
        let (dir, svc) = service_with("name: web\n");
        fs::write(dir.path().join("web/app.py"), "print()").unwrap();
        svc.add_file("app.py".to_string());

        let summary = svc.summary().unwrap();
        assert_eq!(summary["name"], "web");
        assert_eq!(summary["owner"], "web");
        assert!(summary["version"].as_str().unwrap().ends_with(".sha"));
        assert_eq!(summary["tasks"], json!([]));
    }

    #[test]
    fn test_build_metadata_images() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("web");
        fs::create_dir(&root).unwrap();
        fs::write(root.join(DESCRIPTOR_NAME), "name: web\n").unwrap();

        let mut config = ForgeConfig::new(dir.path());
        config
            .profiles
            .get_mut(DEFAULT_PROFILE)
            .unwrap()
            .registry = Some("registry.example.com".to_string());
        let svc = Arc::new(
            Service::discover(
                Arc::new(config),
                GitAdapter::default(),
                root.join(DESCRIPTOR_NAME),
                false,
            )
            .unwrap(),
        );
        svc.add_dockerfile("Dockerfile".to_string());

        let metadata = svc.build_metadata().unwrap();
        let version = svc.version().unwrap();
        assert_eq!(metadata["build"]["name"], "web-default");
        assert_eq!(
            metadata["build"]["images"]["web"],
            json!(format!("registry.example.com/web:{}", version))
        );
    }
}
