//! Command handlers for the forge CLI
//!
//! Each handler builds a discovery context from the parsed arguments, runs
//! one operation, and returns a process exit code: 0 on success, 1 on an
//! operational failure.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::error;

use super::commands::{BuildArgs, CliArgs, DepsArgs, DiscoverArgs, SummaryArgs, VersionArgs};
use super::output::{render_dependencies, render_services};
use crate::builder::DockerCli;
use crate::config::ForgeConfig;
use crate::discovery::Discovery;
use crate::service::Service;

pub fn handle_discover(cli: &CliArgs, args: &DiscoverArgs) -> i32 {
    run(cli, |mut discovery| {
        let path = args
            .path
            .clone()
            .unwrap_or_else(|| discovery.config().base.clone());
        let services = discovery.search(&path)?;
        print!("{}", render_services(&services, args.format)?);
        Ok(())
    })
}

pub fn handle_deps(cli: &CliArgs, args: &DepsArgs) -> i32 {
    run(cli, |mut discovery| {
        let base = discovery.config().base.clone();
        discovery.search(&base)?;
        let added = discovery.dependencies(&args.targets)?;
        println!("{}", render_dependencies(&added, args.format));
        Ok(())
    })
}

pub fn handle_build(cli: &CliArgs, args: &BuildArgs) -> i32 {
    run(cli, |mut discovery| {
        let service = find_service(&mut discovery, &args.name)?;
        let docker = DockerCli::default();
        for container in service.containers() {
            container.build(&docker)?;
        }
        Ok(())
    })
}

pub fn handle_version(cli: &CliArgs, args: &VersionArgs) -> i32 {
    run(cli, |mut discovery| {
        let service = find_service(&mut discovery, &args.name)?;
        println!("{}", service.version()?);
        Ok(())
    })
}

pub fn handle_summary(cli: &CliArgs, args: &SummaryArgs) -> i32 {
    run(cli, |mut discovery| {
        let service = find_service(&mut discovery, &args.name)?;
        println!("{}", serde_json::to_string_pretty(&service.summary()?)?);
        Ok(())
    })
}

fn find_service(discovery: &mut Discovery, name: &str) -> Result<Arc<Service>> {
    let base = discovery.config().base.clone();
    discovery.search(&base)?;
    discovery
        .registry()
        .get(name)
        .cloned()
        .with_context(|| format!("no service named {:?} under {}", name, base.display()))
}

fn run(cli: &CliArgs, body: impl FnOnce(Discovery) -> Result<()>) -> i32 {
    let config = match build_config(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };
    match body(Discovery::new(config)) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

fn build_config(cli: &CliArgs) -> Result<ForgeConfig> {
    let base = match &cli.base {
        Some(base) => base.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let env = std::env::vars().collect();
    let mut config = ForgeConfig::from_env_snapshot(base, env)?;
    if cli.branch.is_some() {
        config.branch = cli.branch.clone();
    }
    if cli.profile.is_some() {
        config.profile = cli.profile.clone();
    }
    Ok(config)
}
