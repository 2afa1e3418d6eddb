//! External tool detection.

use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Required tools not found: {}", .tools.join(", "))]
    Missing { tools: Vec<String> },
}

/// Tools checked at startup in addition to the configured binaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub extra: Vec<PathBuf>,
}

/// Which stages of a run will execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStages {
    pub acquisition: bool,
    pub compression: bool,
}

/// Binaries a run with `stages` depends on.
pub fn required_tools(config: &Config, stages: RunStages) -> Vec<PathBuf> {
    let mut tools = Vec::new();
    if stages.acquisition {
        tools.push(config.downloader.you_get_path.clone());
        tools.push(config.converter.ffmpeg_path.clone());
    }
    if stages.compression {
        if let Some(driver) = &config.compression.driver_path {
            tools.push(driver.clone());
        }
    }
    for extra in &config.tools.extra {
        if !tools.contains(extra) {
            tools.push(extra.clone());
        }
    }
    tools
}

/// Resolves every tool, failing with the complete list of missing ones.
///
/// A name with a directory component is checked as given; a bare name is
/// searched on `PATH`.
pub fn detect_tools(tools: &[PathBuf]) -> Result<Vec<PathBuf>, ToolError> {
    let mut resolved = Vec::with_capacity(tools.len());
    let mut missing = Vec::new();

    for tool in tools {
        match resolve(tool) {
            Some(path) => {
                tracing::debug!(tool = %tool.display(), path = %path.display(), "Tool found");
                resolved.push(path);
            }
            None => missing.push(tool.display().to_string()),
        }
    }

    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(ToolError::Missing { tools: missing })
    }
}

fn resolve(tool: &Path) -> Option<PathBuf> {
    if tool.components().count() > 1 || tool.is_absolute() {
        return tool.is_file().then(|| tool.to_path_buf());
    }
    find_in_path(tool.as_os_str())
}

fn find_in_path(tool: &OsStr) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let full = dir.join(tool);
        if full.is_file() {
            return Some(full);
        }
        #[cfg(windows)]
        {
            let mut exe = tool.to_os_string();
            exe.push(".exe");
            let exe = dir.join(exe);
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}
