//! Git adapter
//!
//! Synchronous subprocess wrapper around the `git` binary exposing the
//! queries discovery and versioning need: working-tree state, branch and
//! commit lookups scoped to a path, remote probing, and shallow
//! clone/pull for remote dependency resolution.
//!
//! All calls block. A configurable timeout guards against hung remotes;
//! when it fires, the child is killed and [`GitError::Timeout`] is
//! returned. Probe methods (`current_branch`, `last_commit_touching`,
//! `remote_url`, `remote_exists`) map a failing `git` invocation to
//! "no answer" rather than an error; mutating operations (`clone_shallow`,
//! `pull_shallow`) propagate failures.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::util::search_parents;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors from git subprocess invocations
#[derive(Debug, Error)]
pub enum GitError {
    /// The git binary could not be spawned
    #[error("failed to run git {args:?}: {source}")]
    Spawn {
        args: Vec<String>,
        source: std::io::Error,
    },

    /// git exited with an unexpected status
    #[error("git {args:?} exited with status {code}: {stderr}")]
    Exit {
        args: Vec<String>,
        code: i32,
        stderr: String,
    },

    /// The configured timeout elapsed before git finished
    #[error("git {args:?} timed out after {timeout:?}")]
    Timeout { args: Vec<String>, timeout: Duration },
}

/// Captured result of a finished git invocation
#[derive(Debug)]
struct GitOutput {
    code: i32,
    stdout: String,
}

/// Synchronous adapter over the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitAdapter {
    timeout: Option<Duration>,
}

/// Returns the root of the working tree enclosing `path`, if any.
///
/// Detection is by upward `.git` lookup, so it works for trees where the
/// git binary is unavailable.
pub fn find_git_root(path: &Path) -> Option<PathBuf> {
    search_parents(".git", path)
}

impl GitAdapter {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// True when the working tree has uncommitted changes under `path`.
    ///
    /// Runs `git diff --quiet HEAD .` scoped to `path`; exit code 0 means
    /// clean, 1 means dirty, anything else is an error.
    pub fn has_local_modifications(&self, path: &Path) -> Result<bool, GitError> {
        let out = self.run(Some(path), &["diff", "--quiet", "HEAD", "."], &[0, 1])?;
        Ok(out.code == 1)
    }

    /// Short hash of the most recent commit touching `path`, or `None` when
    /// no commit does (or the query fails).
    pub fn last_commit_touching(&self, path: &Path) -> Option<String> {
        let out = self
            .run(Some(path), &["log", "-n1", "--format=%h", "--", "."], &[0])
            .ok()?;
        let hash = out.stdout.trim();
        if hash.is_empty() {
            None
        } else {
            Some(hash.to_string())
        }
    }

    /// Current branch name at `path`; `None` on detached HEAD or outside a
    /// repository.
    pub fn current_branch(&self, path: &Path) -> Option<String> {
        let out = self
            .run(Some(path), &["rev-parse", "--abbrev-ref", "HEAD"], &[0])
            .ok()?;
        let branch = out.stdout.trim();
        if branch.is_empty() || branch == "HEAD" {
            None
        } else {
            Some(branch.to_string())
        }
    }

    /// URL of the `origin` remote for the repository enclosing `path`.
    pub fn remote_url(&self, path: &Path) -> Option<String> {
        let out = self
            .run(Some(path), &["remote", "get-url", "origin"], &[0])
            .ok()?;
        let url = out.stdout.trim();
        if url.is_empty() {
            None
        } else {
            Some(url.to_string())
        }
    }

    /// True when `url` names a reachable remote repository.
    pub fn remote_exists(&self, url: &str) -> bool {
        match self.run(None, &["ls-remote", "--exit-code", url, "HEAD"], &[0]) {
            Ok(_) => true,
            Err(e) => {
                debug!(url, error = %e, "remote probe failed");
                false
            }
        }
    }

    /// Shallow-clones `url` into `target`.
    pub fn clone_shallow(&self, url: &str, target: &Path) -> Result<(), GitError> {
        info!(url, target = %target.display(), "cloning dependency");
        let target_str = target.to_string_lossy();
        self.run(None, &["clone", "--depth", "1", url, &target_str], &[0])?;
        Ok(())
    }

    /// Updates a shallow clone in place.
    pub fn pull_shallow(&self, path: &Path) -> Result<(), GitError> {
        self.run(Some(path), &["pull", "--update-shallow"], &[0])?;
        Ok(())
    }

    fn run(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
        expected: &[i32],
    ) -> Result<GitOutput, GitError> {
        let argv: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        debug!(args = ?argv, cwd = ?cwd, "running git");

        let mut cmd = Command::new("git");
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let (status, stdout, stderr) = match self.timeout {
            None => {
                let output = cmd.output().map_err(|source| GitError::Spawn {
                    args: argv.clone(),
                    source,
                })?;
                (
                    output.status,
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                )
            }
            Some(timeout) => {
                let mut child = cmd.spawn().map_err(|source| GitError::Spawn {
                    args: argv.clone(),
                    source,
                })?;
                let deadline = Instant::now() + timeout;
                let status = loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break status,
                        Ok(None) => {
                            if Instant::now() >= deadline {
                                let _ = child.kill();
                                let _ = child.wait();
                                return Err(GitError::Timeout {
                                    args: argv,
                                    timeout,
                                });
                            }
                            std::thread::sleep(POLL_INTERVAL);
                        }
                        Err(source) => {
                            return Err(GitError::Spawn { args: argv, source });
                        }
                    }
                };
                let mut stdout = String::new();
                if let Some(mut pipe) = child.stdout.take() {
                    let _ = pipe.read_to_string(&mut stdout);
                }
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                (status, stdout, stderr)
            }
        };

        let code = status.code().unwrap_or(-1);
        if !expected.contains(&code) {
            return Err(GitError::Exit {
                args: argv,
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(GitOutput { code, stdout })
    }
}

/// Derives the sibling repository URL for `dep` by replacing the last path
/// segment of `url`.
///
/// `git@github.com:org/app.git` + `auth` becomes
/// `git@github.com:org/auth.git`.
pub fn sibling_remote_url(url: &str, dep: &str) -> String {
    match url.rsplit_once('/') {
        Some((prefix, _)) => format!("{}/{}.git", prefix, dep),
        None => format!("{}.git", dep),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_git_root() {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("repo/.git")).unwrap();
        fs::create_dir_all(base.join("repo/svc/deep")).unwrap();

        assert_eq!(
            find_git_root(&base.join("repo/svc/deep")),
            Some(base.join("repo"))
        );
    }

    #[test]
    fn test_sibling_remote_url() {
        assert_eq!(
            sibling_remote_url("https://github.com/org/app.git", "auth"),
            "https://github.com/org/auth.git"
        );
        assert_eq!(
            sibling_remote_url("git@github.com:org/app.git", "auth"),
            "git@github.com:org/auth.git"
        );
    }

    #[test]
    fn test_probe_outside_repository_returns_none() {
        let dir = TempDir::new().unwrap();
        let git = GitAdapter::default();
        // No repository here; probes answer None instead of failing.
        assert_eq!(git.current_branch(dir.path()), None);
        assert_eq!(git.last_commit_touching(dir.path()), None);
        assert_eq!(git.remote_url(dir.path()), None);
    }
}
