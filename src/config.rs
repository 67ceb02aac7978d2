//! Configuration for forge
//!
//! Runtime configuration for discovery and dependency resolution. A
//! [`ForgeConfig`] carries the workspace base directory, optional branch and
//! profile overrides, the per-profile settings (dependency search paths and
//! image registry prefix), and an explicit environment snapshot. The
//! snapshot is captured once at the boundary and passed down; nothing in the
//! core reads the process environment directly.
//!
//! # Environment Variables
//!
//! - `FORGE_BRANCH`: branch override, takes precedence over the detected
//!   VCS branch
//! - `FORGE_PROFILE`: profile override, bypasses branch-glob matching
//! - `FORGE_SEARCH_PATH`: colon-separated directories (relative to the base)
//!   searched for unresolved dependencies, applied to the default profile
//! - `FORGE_REGISTRY`: image registry prefix for the default profile
//! - `FORGE_GIT_TIMEOUT_SECS`: timeout for git subprocess calls (no timeout
//!   when unset)
//! - `FORGE_LOG_LEVEL`: logging level - default: "info"

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PROFILE: &str = "default";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The profile map must always carry a "default" entry
    #[error("no \"{DEFAULT_PROFILE}\" profile configured")]
    MissingDefaultProfile,

    /// Failed to parse a configuration value
    #[error("failed to parse {field}: {value:?}")]
    ParseError { field: String, value: String },
}

/// Per-profile settings
///
/// A profile names a build/deploy variant; services select one by matching
/// their branch against the descriptor's branch globs.
#[derive(Debug, Clone, Default)]
pub struct ProfileConfig {
    /// Directories (relative to the workspace base) searched for
    /// dependencies that are not in the registry yet
    pub search_path: Vec<PathBuf>,

    /// Image registry prefix, e.g. "registry.example.com/team"
    pub registry: Option<String>,
}

/// Runtime configuration shared by discovery, resolution, and builds
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Workspace base directory; profile search paths resolve against it
    pub base: PathBuf,

    /// Branch override; when set, detected VCS branches are ignored
    pub branch: Option<String>,

    /// Profile override; when set, branch-glob matching is skipped
    pub profile: Option<String>,

    /// Profile map; always contains [`DEFAULT_PROFILE`]
    pub profiles: HashMap<String, ProfileConfig>,

    /// Environment snapshot handed to descriptor templating and metadata
    pub env: HashMap<String, String>,

    /// Timeout applied to git subprocess invocations
    pub git_timeout: Option<Duration>,
}

impl ForgeConfig {
    /// Creates a configuration with defaults and an empty environment
    /// snapshot.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), ProfileConfig::default());
        Self {
            base: base.into(),
            branch: None,
            profile: None,
            profiles,
            env: HashMap::new(),
            git_timeout: None,
        }
    }

    /// Creates a configuration from an environment snapshot.
    ///
    /// The snapshot is retained verbatim in [`ForgeConfig::env`]; the
    /// `FORGE_*` variables documented at the module level are interpreted
    /// here and nowhere else.
    pub fn from_env_snapshot(
        base: impl Into<PathBuf>,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(base);

        config.branch = env.get("FORGE_BRANCH").cloned();
        config.profile = env.get("FORGE_PROFILE").cloned();

        if let Some(raw) = env.get("FORGE_GIT_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::ParseError {
                field: "FORGE_GIT_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
            })?;
            config.git_timeout = Some(Duration::from_secs(secs));
        }

        {
            let default = config
                .profiles
                .get_mut(DEFAULT_PROFILE)
                .expect("default profile inserted by new()");
            if let Some(raw) = env.get("FORGE_SEARCH_PATH") {
                default.search_path = raw
                    .split(':')
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
            default.registry = env.get("FORGE_REGISTRY").cloned();
        }

        config.env = env;
        config.validate()?;
        Ok(config)
    }

    /// Validates invariants that later stages rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.profiles.contains_key(DEFAULT_PROFILE) {
            return Err(ConfigError::MissingDefaultProfile);
        }
        Ok(())
    }

    /// Returns the settings for `profile`, falling back to the default
    /// profile for unknown names.
    pub fn profile_config(&self, profile: &str) -> &ProfileConfig {
        self.profiles
            .get(profile)
            .or_else(|| self.profiles.get(DEFAULT_PROFILE))
            .expect("default profile always present")
    }
}
