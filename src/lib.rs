//! forge - service discovery and dependency resolution for multi-service builds
//!
//! This library is the discovery and dependency-resolution engine of a
//! multi-service build/deploy orchestrator. Given a directory tree
//! (possibly spanning several repositories) it locates every service (a
//! directory marked by a `service.yaml` descriptor), builds a
//! name-addressed registry, resolves declared dependencies into a closed
//! set (fetching missing ones from sibling repositories), and computes a
//! deterministic content-derived version per service for image tagging and
//! build caching.
//!
//! # Core Concepts
//!
//! - **Service**: a deployable unit rooted at a descriptor file, with the
//!   loose files and Dockerfiles the discovery walk attributes to it
//! - **Discovery**: an ignore-aware recursive walk that populates the
//!   service registry
//! - **Resolution**: the transitive closure over `requires` declarations,
//!   with search-path lookup and shallow-clone fallback for missing names
//! - **Version**: `<commit>.git` for clean working trees, `<sha256>.sha`
//!   over the file set otherwise
//!
//! # Example Usage
//!
//! ```no_run
//! use forge::{Discovery, ForgeConfig};
//! use std::path::Path;
//!
//! fn resolve(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut discovery = Discovery::new(ForgeConfig::new(root));
//!     let services = discovery.search(root)?;
//!     for service in &services {
//!         println!("{} {}", service.name(), service.version()?);
//!     }
//!     let added = discovery.dependencies(&["frontend".to_string()])?;
//!     println!("also building: {:?}", added);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod git;
pub mod ignore_rules;
pub mod service;
pub mod util;
pub mod version;

// Re-export key types for convenient access
pub use builder::{BuildError, BuildSession, DockerCli, ImageBuilder};
pub use config::{ConfigError, ForgeConfig, ProfileConfig, DEFAULT_PROFILE};
pub use descriptor::{
    is_service_descriptor, ContainerSpec, DescriptorError, RebuildSpec, ServiceDescriptor,
    DESCRIPTOR_NAME,
};
pub use discovery::{Discovery, DiscoveryError, Registry, ResolveError};
pub use git::{GitAdapter, GitError};
pub use ignore_rules::{IgnoreError, IgnoreSet};
pub use service::{Container, Service, ServiceError};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};
pub use version::VersionError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
