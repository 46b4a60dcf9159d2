//! Application directory helpers anchored to a single `.djmix` folder.
//!
//! Cache, logs, and the weights file all live under the OS config directory
//! by default; a `DJMIX_CONFIG_HOME` environment variable or an explicit
//! `--data-dir` override relocates the whole tree for portable setups and
//! tests.

use std::{
    path::PathBuf,
    sync::{LazyLock, Mutex},
};

use directories::BaseDirs;
use thiserror::Error;

use crate::weights::WEIGHTS_FILE_NAME;

/// Name of the application directory under the OS config root.
pub const APP_DIR_NAME: &str = ".djmix";

const ENV_OVERRIDE: &str = "DJMIX_CONFIG_HOME";

static APP_ROOT_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Point the whole `.djmix` tree somewhere else (e.g. `--data-dir`).
pub fn set_app_root_override(path: PathBuf) -> Result<(), AppDirError> {
    ensure_dir(&path)?;
    *APP_ROOT_OVERRIDE
        .lock()
        .expect("app root override mutex poisoned") = Some(path);
    Ok(())
}

/// Return the root `.djmix` directory, creating it if needed.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    if let Some(path) = APP_ROOT_OVERRIDE
        .lock()
        .expect("app root override mutex poisoned")
        .clone()
    {
        ensure_dir(&path)?;
        return Ok(path);
    }
    let base = base_dir().ok_or(AppDirError::NoBaseDir)?;
    let path = base.join(APP_DIR_NAME);
    ensure_dir(&path)?;
    Ok(path)
}

/// Analysis cache and render temp directory.
pub fn cache_dir() -> Result<PathBuf, AppDirError> {
    subdir("cache")
}

pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    subdir("logs")
}

pub fn weights_path() -> Result<PathBuf, AppDirError> {
    Ok(app_root_dir()?.join(WEIGHTS_FILE_NAME))
}

fn subdir(name: &str) -> Result<PathBuf, AppDirError> {
    let path = app_root_dir()?.join(name);
    ensure_dir(&path)?;
    Ok(path)
}

fn ensure_dir(path: &PathBuf) -> Result<(), AppDirError> {
    std::fs::create_dir_all(path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })
}

fn base_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_OVERRIDE) {
        return Some(PathBuf::from(path));
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}
