use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub config_path: PathBuf,
    pub secrets_path: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        Self::with_root(discover_project_root())
    }

    pub fn with_root(project_root: PathBuf) -> Self {
        let config_path = env::var("DOCCHAT_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| project_root.join("config.yml"));
        let secrets_path = project_root.join("secrets.yaml");
        let log_dir = project_root.join("logs");

        AppPaths {
            project_root,
            config_path,
            secrets_path,
            log_dir,
        }
    }

    /// Resolves a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("DOCCHAT_ROOT") {
        return PathBuf::from(root);
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_absolute_paths() {
        let paths = AppPaths::with_root(PathBuf::from("/srv/docchat"));
        assert_eq!(paths.resolve(Path::new("data")), PathBuf::from("/srv/docchat/data"));
        assert_eq!(paths.resolve(Path::new("/tmp/pdfs")), PathBuf::from("/tmp/pdfs"));
        assert_eq!(paths.secrets_path, PathBuf::from("/srv/docchat/secrets.yaml"));
    }
}
