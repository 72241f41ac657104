//! Initialization helpers for `.yasi/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{YasiConfig, write_config};

/// All canonical paths within `.yasi/` for a working directory.
#[derive(Debug, Clone)]
pub struct YasiPaths {
    pub root: PathBuf,
    pub yasi_dir: PathBuf,
    pub state_dir: PathBuf,
    pub presence_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub idle_state_path: PathBuf,
}

impl YasiPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let yasi_dir = root.join(".yasi");
        let state_dir = yasi_dir.join("state");
        Self {
            root: root.clone(),
            yasi_dir: yasi_dir.clone(),
            state_dir: state_dir.clone(),
            presence_dir: yasi_dir.join("presence"),
            gitignore_path: yasi_dir.join(".gitignore"),
            config_path: yasi_dir.join("config.toml"),
            idle_state_path: state_dir.join("idle_state.json"),
        }
    }

    /// Use an explicit config file instead of `.yasi/config.toml`.
    pub fn with_config(mut self, config_path: Option<PathBuf>) -> Self {
        if let Some(path) = config_path {
            self.config_path = path;
        }
        self
    }
}

/// State table kept next to a batch list (`games.txt` → `games.txt.state.json`).
pub fn batch_state_path(list_path: &Path) -> PathBuf {
    let mut name = list_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "batch".into());
    name.push(".state.json");
    list_path.with_file_name(name)
}

/// Options for `init_yasi`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite an existing config with defaults.
    pub force: bool,
}

/// Create `.yasi/` scaffolding in `root` with a default config.
///
/// Fails if the config already exists unless `options.force` is set.
pub fn init_yasi(root: &Path, options: &InitOptions) -> Result<YasiPaths> {
    let paths = YasiPaths::new(root);
    if paths.yasi_dir.exists() && !paths.yasi_dir.is_dir() {
        return Err(anyhow!("yasi init: .yasi exists but is not a directory"));
    }
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "yasi init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }

    create_dir(&paths.yasi_dir)?;
    create_dir(&paths.state_dir)?;
    create_dir(&paths.presence_dir)?;

    write_file(&paths.gitignore_path, YASI_GITIGNORE)?;
    write_config(&paths.config_path, &YasiConfig::default())?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const YASI_GITIGNORE: &str = "state/\npresence/\n";
