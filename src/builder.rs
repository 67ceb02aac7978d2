//! Image builder seam
//!
//! Containers are built through the [`ImageBuilder`] trait so the core
//! never talks to a container runtime directly. Two paths exist: a full
//! rebuild (`build`) and an incremental session (`session`) that mutates a
//! running container with copies and commands, then commits the result as
//! the final image.
//!
//! [`DockerCli`] is the default implementation, shelling out to the
//! `docker` binary. Tests substitute their own recording implementations.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

use crate::version::VersionError;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to run docker {args:?}: {source}")]
    Spawn {
        args: Vec<String>,
        source: io::Error,
    },

    #[error("docker {args:?} exited with status {code}: {stderr}")]
    Exit {
        args: Vec<String>,
        code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// An open incremental-build session bound to one image/version.
pub trait BuildSession {
    /// Executes a command inside the session.
    fn run(&mut self, cmd: &[&str]) -> Result<(), BuildError>;

    /// Copies a path from the host into the session.
    fn copy(&mut self, src: &Path, dst: &Path) -> Result<(), BuildError>;

    /// Commits the session state as `image:version` and closes it.
    fn commit(&mut self, image: &str, version: &str) -> Result<(), BuildError>;
}

/// Image build collaborator.
pub trait ImageBuilder {
    /// Full rebuild from a Dockerfile.
    fn build(
        &self,
        context: &Path,
        dockerfile: &Path,
        image: &str,
        version: &str,
        args: &BTreeMap<String, String>,
        builder: Option<&str>,
    ) -> Result<(), BuildError>;

    /// Opens an incremental session for `image:version`, building the base
    /// image first if it does not exist yet.
    fn session(
        &self,
        context: &Path,
        dockerfile: &Path,
        image: &str,
        version: &str,
        args: &BTreeMap<String, String>,
        builder: Option<&str>,
    ) -> Result<Box<dyn BuildSession>, BuildError>;
}

/// `docker` CLI-backed builder.
#[derive(Debug, Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    fn docker(&self, args: &[&str], expected_ok: bool) -> Result<String, BuildError> {
        let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        debug!(args = ?argv, "running docker");
        let output = Command::new("docker")
            .args(args)
            .output()
            .map_err(|source| BuildError::Spawn {
                args: argv.clone(),
                source,
            })?;
        if expected_ok && !output.status.success() {
            return Err(BuildError::Exit {
                args: argv,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn image_exists(&self, tag: &str) -> bool {
        Command::new("docker")
            .args(["image", "inspect", tag])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl ImageBuilder for DockerCli {
    fn build(
        &self,
        context: &Path,
        dockerfile: &Path,
        image: &str,
        version: &str,
        args: &BTreeMap<String, String>,
        builder: Option<&str>,
    ) -> Result<(), BuildError> {
        let tag = format!("{}:{}", image, version);
        info!(%tag, context = %context.display(), "building image");

        let dockerfile_str = dockerfile.to_string_lossy();
        let context_str = context.to_string_lossy();
        let mut argv: Vec<String> = Vec::new();
        if let Some(name) = builder {
            argv.extend(["buildx", "build", "--builder", name].map(String::from));
        } else {
            argv.push("build".to_string());
        }
        argv.extend(["-f".to_string(), dockerfile_str.to_string()]);
        argv.extend(["-t".to_string(), tag]);
        for (key, value) in args {
            argv.push("--build-arg".to_string());
            argv.push(format!("{}={}", key, value));
        }
        argv.push(context_str.to_string());

        let arg_refs: Vec<&str> = argv.iter().map(String::as_str).collect();
        self.docker(&arg_refs, true)?;
        Ok(())
    }

    fn session(
        &self,
        context: &Path,
        dockerfile: &Path,
        image: &str,
        version: &str,
        args: &BTreeMap<String, String>,
        builder: Option<&str>,
    ) -> Result<Box<dyn BuildSession>, BuildError> {
        let tag = format!("{}:{}", image, version);
        if !self.image_exists(&tag) {
            self.build(context, dockerfile, image, version, args, builder)?;
        }

        let cid = self
            .docker(
                &["run", "-d", "--entrypoint", "sleep", &tag, "infinity"],
                true,
            )?
            .trim()
            .to_string();
        debug!(%tag, container = %cid, "opened build session");
        Ok(Box::new(DockerSession {
            cli: self.clone(),
            container: cid,
            open: true,
        }))
    }
}

struct DockerSession {
    cli: DockerCli,
    container: String,
    open: bool,
}

impl BuildSession for DockerSession {
    fn run(&mut self, cmd: &[&str]) -> Result<(), BuildError> {
        let mut argv = vec!["exec", self.container.as_str()];
        argv.extend_from_slice(cmd);
        self.cli.docker(&argv, true)?;
        Ok(())
    }

    fn copy(&mut self, src: &Path, dst: &Path) -> Result<(), BuildError> {
        let src_str = src.to_string_lossy();
        let dst_ref = format!("{}:{}", self.container, dst.display());
        self.cli.docker(&["cp", &src_str, &dst_ref], true)?;
        Ok(())
    }

    fn commit(&mut self, image: &str, version: &str) -> Result<(), BuildError> {
        let tag = format!("{}:{}", image, version);
        self.cli.docker(&["commit", &self.container, &tag], true)?;
        self.cli.docker(&["rm", "-f", &self.container], false)?;
        self.open = false;
        info!(%tag, "committed build session");
        Ok(())
    }
}

impl Drop for DockerSession {
    fn drop(&mut self) {
        if self.open {
            let _ = self.cli.docker(&["rm", "-f", &self.container], false);
        }
    }
}
