//! File lookup: the `locate-file` executor and the shared locator.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde_json::json;
use tracing::{debug, info};

use ghosthand_contracts::{
    action::{ActionKind, Parameters},
    error::{GhosthandError, GhosthandResult},
    execution::StepResult,
};
use ghosthand_core::traits::ActionExecutor;

use crate::params;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Finds the newest file whose name contains a pattern.
///
/// Only the top level of each search directory is scanned. Missing
/// directories are ignored.
#[derive(Debug, Clone, Default)]
pub struct FileLocator {
    search_dirs: Vec<PathBuf>,
}

impl FileLocator {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Newest file in `dirs` whose name contains `pattern` (case-insensitive).
    pub fn newest_in(dirs: &[PathBuf], pattern: &str, images_only: bool) -> Option<PathBuf> {
        let needle = pattern.to_lowercase();
        let mut best: Option<(SystemTime, PathBuf)> = None;

        for dir in dirs {
            let Ok(listing) = fs::read_dir(dir) else {
                debug!(dir = %dir.display(), "search directory unreadable; skipped");
                continue;
            };
            for entry in listing.flatten() {
                let path = entry.path();
                let name_matches = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase().contains(&needle));
                if !name_matches || (images_only && !is_image(&path)) {
                    continue;
                }
                let Ok(meta) = entry.metadata() else { continue };
                if !meta.is_file() {
                    continue;
                }
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                if best.as_ref().map_or(true, |(t, _)| modified > *t) {
                    best = Some((modified, path));
                }
            }
        }
        best.map(|(_, path)| path)
    }

    pub fn newest(&self, pattern: &str, images_only: bool) -> Option<PathBuf> {
        Self::newest_in(&self.search_dirs, pattern, images_only)
    }

    /// Treat `target` as a path if it names an existing file, otherwise as a
    /// name pattern for the newest match.
    pub fn resolve(&self, kind: &str, target: &str, images_only: bool) -> GhosthandResult<PathBuf> {
        let direct = expand_home(target);
        if direct.is_file() {
            return Ok(direct);
        }
        self.newest(target, images_only).ok_or_else(|| {
            let noun = if images_only { "image" } else { "file" };
            GhosthandError::executor(kind, format!("no {} matching '{}' found", noun, target))
        })
    }
}

/// `locate-file`: report the newest file matching `pattern`.
pub struct LocateFileExecutor {
    locator: FileLocator,
}

impl LocateFileExecutor {
    pub fn new(locator: FileLocator) -> Self {
        Self { locator }
    }
}

impl ActionExecutor for LocateFileExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::LocateFile.as_str();
        let pattern = params::required_str(kind, parameters, "pattern")?;

        let found = match params::optional_str(parameters, "directory") {
            Some(dir) => FileLocator::newest_in(&[expand_home(dir)], pattern, false),
            None => self.locator.newest(pattern, false),
        };

        match found {
            Some(path) => {
                info!(pattern = %pattern, path = %path.display(), "file located");
                Ok(StepResult::success_with(
                    format!("found {}", path.display()),
                    json!({ "path": path.display().to_string() }),
                ))
            }
            None => Err(GhosthandError::executor(
                kind,
                format!("no file matching '{}' found", pattern),
            )),
        }
    }
}
