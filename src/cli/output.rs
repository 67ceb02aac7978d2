//! Output formatting for the forge CLI

use clap::ValueEnum;
use serde_json::json;
use std::sync::Arc;

use crate::service::{Service, ServiceError};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned plain-text lines
    Human,
    /// Machine-readable JSON
    Json,
}

/// Renders a discovery result list.
pub fn render_services(
    services: &[Arc<Service>],
    format: OutputFormat,
) -> Result<String, ServiceError> {
    match format {
        OutputFormat::Human => {
            let mut out = String::new();
            for service in services {
                out.push_str(&format!(
                    "{:<24} {:<16} {}\n",
                    service.name(),
                    service.version()?,
                    service.root().display()
                ));
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let mut entries = Vec::new();
            for service in services {
                entries.push(json!({
                    "name": service.name(),
                    "version": service.version()?,
                    "root": service.root().display().to_string(),
                    "requires": service.requires(),
                    "containers": service
                        .containers()
                        .iter()
                        .map(|c| c.image())
                        .collect::<Vec<_>>(),
                }));
            }
            Ok(serde_json::to_string_pretty(&entries).unwrap_or_default())
        }
    }
}

/// Renders a resolved dependency list.
pub fn render_dependencies(added: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => added.join("\n"),
        OutputFormat::Json => serde_json::to_string_pretty(added).unwrap_or_default(),
    }
}
