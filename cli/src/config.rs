use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Overrides the database location, e.g. for tests or a synced folder.
pub const DB_PATH_ENV: &str = "KCAL_DB_PATH";

pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
            return Self::at(PathBuf::from(path));
        }

        let proj_dirs =
            ProjectDirs::from("", "", "kcal").context("Could not determine home directory")?;
        Self::at(proj_dirs.data_dir().join("kcal.db"))
    }

    fn at(db_path: PathBuf) -> Result<Self> {
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir(dir)?;
        }
        Ok(Config { db_path })
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_creates_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("kcal.db");
        let config = Config::at(db_path.clone()).unwrap();
        assert_eq!(config.db_path, db_path);
        assert!(tmp.path().join("nested").join("dir").is_dir());
    }

    #[test]
    fn test_at_bare_file_name() {
        let config = Config::at(PathBuf::from("kcal.db")).unwrap();
        assert_eq!(config.db_path, PathBuf::from("kcal.db"));
    }
}
