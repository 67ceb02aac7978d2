//! Container build units
//!
//! Each container belongs to exactly one service and builds one image. The
//! build path is selected by the rebuild spec: when one is declared with
//! sources or a command, the image is updated incrementally inside a build
//! session (copy sources, run the command, commit); otherwise the image is
//! rebuilt from its Dockerfile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::builder::{BuildError, ImageBuilder};
use crate::descriptor::{ContainerSpec, RebuildSpec};
use crate::service::Service;
use crate::version::VersionError;

/// One buildable image unit of a service.
///
/// A borrowed view: containers are derived from their service on demand
/// and live only as long as it.
#[derive(Debug)]
pub struct Container<'a> {
    service: &'a Service,

    /// Dockerfile path relative to the service root
    pub dockerfile: String,

    /// Build context relative to the service root; defaults to the
    /// dockerfile's directory
    pub context: String,

    /// Build arguments
    pub args: BTreeMap<String, String>,

    /// Incremental rebuild strategy
    pub rebuild: Option<RebuildSpec>,

    /// Explicit image name override
    pub name: Option<String>,

    /// Ordinal among the service's containers; disambiguates anonymous
    /// entries
    pub index: usize,

    /// Builder identifier forwarded to the image builder
    pub builder: Option<String>,
}

impl<'a> Container<'a> {
    pub(crate) fn from_spec(service: &'a Service, spec: ContainerSpec, index: usize) -> Self {
        let context = spec.context.unwrap_or_else(|| {
            Path::new(&spec.dockerfile)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        Self {
            service,
            dockerfile: spec.dockerfile,
            context,
            args: spec.args,
            rebuild: spec.rebuild,
            name: spec.name,
            index,
            builder: spec.builder,
        }
    }

    pub(crate) fn from_dockerfile(service: &'a Service, dockerfile: String, index: usize) -> Self {
        Self::from_spec(
            service,
            ContainerSpec {
                dockerfile,
                ..Default::default()
            },
            index,
        )
    }

    pub fn service(&self) -> &Service {
        self.service
    }

    /// Image name: explicit override, else derived from the owning service
    /// and the dockerfile location.
    pub fn image(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.service.image(&self.dockerfile),
        }
    }

    /// A container's version is its owning service's version.
    pub fn version(&self) -> Result<String, VersionError> {
        self.service.version()
    }

    pub fn abs_dockerfile(&self) -> PathBuf {
        self.service.root().join(&self.dockerfile)
    }

    pub fn abs_context(&self) -> PathBuf {
        self.service.root().join(&self.context)
    }

    /// Builds this container's image through `builder`, choosing the
    /// incremental session path when an active rebuild spec is present and
    /// the full Dockerfile rebuild otherwise.
    pub fn build(&self, builder: &dyn ImageBuilder) -> Result<(), BuildError> {
        let version = self.version()?;
        let image = self.image();

        match &self.rebuild {
            Some(spec) if spec.is_active() => {
                let mut session = builder.session(
                    &self.abs_context(),
                    &self.abs_dockerfile(),
                    &image,
                    &version,
                    &self.args,
                    self.builder.as_deref(),
                )?;
                session.run(&["mkdir", "-p", &spec.root])?;
                for source in &spec.sources {
                    let abs_source = match &spec.sources_relative {
                        Some(rel) => self.service.root().join(rel).join(source),
                        None => self.service.root().join(source),
                    };
                    let target = Path::new(&spec.root).join(source);
                    let target_str = target.to_string_lossy().into_owned();
                    if abs_source.is_dir() {
                        // docker cp merges into an existing directory;
                        // remove it first so stale files do not survive.
                        session.run(&["rm", "-rf", &target_str])?;
                    }
                    session.copy(&abs_source, &target)?;
                }
                if let Some(command) = &spec.command {
                    session.run(&["/bin/sh", "-c", command])?;
                }
                session.commit(&image, &version)
            }
            _ => builder.build(
                &self.abs_context(),
                &self.abs_dockerfile(),
                &image,
                &version,
                &self.args,
                self.builder.as_deref(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildSession;
    use crate::config::ForgeConfig;
    use crate::descriptor::DESCRIPTOR_NAME;
    use crate::git::GitAdapter;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Records builder calls instead of talking to a container runtime.
    #[derive(Default)]
    struct RecordingBuilder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    struct RecordingSession {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ImageBuilder for RecordingBuilder {
        fn build(
            &self,
            _context: &Path,
            dockerfile: &Path,
            image: &str,
            version: &str,
            _args: &BTreeMap<String, String>,
            _builder: Option<&str>,
        ) -> Result<(), BuildError> {
            self.calls.lock().unwrap().push(format!(
                "build {} {}:{}",
                dockerfile.display(),
                image,
                version
            ));
            Ok(())
        }

        fn session(
            &self,
            _context: &Path,
            _dockerfile: &Path,
            image: &str,
            version: &str,
            _args: &BTreeMap<String, String>,
            _builder: Option<&str>,
        ) -> Result<Box<dyn BuildSession>, BuildError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("session {}:{}", image, version));
            Ok(Box::new(RecordingSession {
                calls: self.calls.clone(),
            }))
        }
    }

    impl BuildSession for RecordingSession {
        fn run(&mut self, cmd: &[&str]) -> Result<(), BuildError> {
            self.calls.lock().unwrap().push(format!("run {}", cmd.join(" ")));
            Ok(())
        }

        fn copy(&mut self, src: &Path, dst: &Path) -> Result<(), BuildError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("copy {} {}", src.display(), dst.display()));
            Ok(())
        }

        fn commit(&mut self, image: &str, version: &str) -> Result<(), BuildError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("commit {}:{}", image, version));
            Ok(())
        }
    }

    fn service_with(descriptor: &str) -> (TempDir, Arc<Service>) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("web");
        fs::create_dir(&root).unwrap();
        fs::write(root.join(DESCRIPTOR_NAME), descriptor).unwrap();
        let svc = Service::discover(
            Arc::new(ForgeConfig::new(dir.path())),
            GitAdapter::default(),
            root.join(DESCRIPTOR_NAME),
            false,
        )
        .unwrap();
        (dir, Arc::new(svc))
    }

    #[test]
    fn test_full_rebuild_without_rebuild_spec() {
        let (_dir, svc) = service_with("name: web\ncontainers:\n  - Dockerfile\n");
        let builder = RecordingBuilder::default();

        svc.containers()[0].build(&builder).unwrap();

        let calls = builder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("build"));
        assert!(calls[0].contains("web:"));
    }

    #[test]
    fn test_empty_rebuild_spec_takes_full_path() {
        let (_dir, svc) =
            service_with("name: web\ncontainers:\n  - dockerfile: Dockerfile\n    rebuild: {}\n");
        let builder = RecordingBuilder::default();

        svc.containers()[0].build(&builder).unwrap();

        let calls = builder.calls.lock().unwrap();
        assert!(calls[0].starts_with("build"));
    }

    #[test]
    fn test_incremental_rebuild_sequence() {
        let (dir, svc) = service_with(
            r#"
name: web
containers:
  - dockerfile: Dockerfile
    rebuild:
      root: /app
      sources: [src, config.yaml]
      command: make quick
"#,
        );
        fs::create_dir(dir.path().join("web/src")).unwrap();
        fs::write(dir.path().join("web/config.yaml"), "x: 1").unwrap();

        let builder = RecordingBuilder::default();
        svc.containers()[0].build(&builder).unwrap();

        let calls = builder.calls.lock().unwrap().clone();
        let version = svc.version().unwrap();
        assert_eq!(calls[0], format!("session web:{}", version));
        assert_eq!(calls[1], "run mkdir -p /app");
        // Directory source is cleared before copy; file source is not.
        assert_eq!(calls[2], "run rm -rf /app/src");
        assert!(calls[3].starts_with("copy"));
        assert!(calls[3].ends_with("/app/src"));
        assert!(calls[4].starts_with("copy"));
        assert!(calls[4].ends_with("/app/config.yaml"));
        assert_eq!(calls[5], "run /bin/sh -c make quick");
        assert_eq!(calls[6], format!("commit web:{}", version));
    }

    #[test]
    fn test_container_version_delegates_to_service() {
        let (_dir, svc) = service_with("name: web\ncontainers:\n  - Dockerfile\n");
        let container = &svc.containers()[0];
        assert_eq!(container.version().unwrap(), svc.version().unwrap());
    }
}
