use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Settings;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppPaths {
    pub fn from_settings(settings: &Settings) -> Self {
        let data_dir = settings
            .data_dir
            .clone()
            .unwrap_or_else(discover_data_dir);
        Self::with_data_dir(data_dir, settings)
    }

    pub fn with_data_dir(data_dir: PathBuf, settings: &Settings) -> Self {
        let log_dir = data_dir.join("logs");
        let checkpoint_path = settings
            .checkpoint_path
            .clone()
            .unwrap_or_else(|| data_dir.join("checkpoints").join("sop_agent.sqlite"));
        let config_path = settings
            .config_path
            .clone()
            .unwrap_or_else(|| discover_config_path(&data_dir));

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            checkpoint_path,
            config_path,
        }
    }
}

fn discover_config_path(data_dir: &Path) -> PathBuf {
    for name in ["sop_config.yaml", "sop_config.yml", "sop_config.json", "sop_config.toml"] {
        let candidate = data_dir.join("config").join(name);
        if candidate.exists() {
            return candidate;
        }
    }
    data_dir.join("config").join("sop_config.json")
}

fn discover_data_dir() -> PathBuf {
    if cfg!(debug_assertions) {
        return env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("sop-agent")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
