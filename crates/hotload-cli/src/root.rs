use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_DIR: &str = ".hotload";
pub const DEFAULT_CONFIG_FILE: &str = "hotload.yaml";
pub const STATE_DB_FILE: &str = "state.redb";

/// Filesystem locations used by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config: PathBuf,
    pub state_dir: PathBuf,
}

impl Paths {
    /// Resolve paths from the `--config` / `--state-dir` flags (or their env
    /// vars), falling back to the current directory.
    pub fn resolve(config: Option<&Path>, state_dir: Option<&Path>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve_in(&cwd, config, state_dir)
    }

    fn resolve_in(cwd: &Path, config: Option<&Path>, state_dir: Option<&Path>) -> Self {
        Self {
            config: config
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_FILE)),
            state_dir: state_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.join(DEFAULT_STATE_DIR)),
        }
    }

    pub fn state_db(&self) -> PathBuf {
        self.state_dir.join(STATE_DB_FILE)
    }

    /// `<state_dir>/active/<file name of script_path>`
    pub fn default_install(&self, script_path: &str) -> PathBuf {
        let name = Path::new(script_path)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "payload".into());
        self.state_dir.join("active").join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_win() {
        let paths = Paths::resolve_in(
            Path::new("/work"),
            Some(Path::new("/etc/hotload.yaml")),
            Some(Path::new("/var/lib/hotload")),
        );
        assert_eq!(paths.config, Path::new("/etc/hotload.yaml"));
        assert_eq!(paths.state_db(), Path::new("/var/lib/hotload/state.redb"));
    }

    #[test]
    fn defaults_are_relative_to_cwd() {
        let paths = Paths::resolve_in(Path::new("/work"), None, None);
        assert_eq!(paths.config, Path::new("/work/hotload.yaml"));
        assert_eq!(paths.state_dir, Path::new("/work/.hotload"));
    }

    #[test]
    fn default_install_uses_script_file_name() {
        let paths = Paths::resolve_in(Path::new("/work"), None, None);
        assert_eq!(
            paths.default_install("dist/bundle/app.js"),
            Path::new("/work/.hotload/active/app.js")
        );
        assert_eq!(
            paths.default_install(""),
            Path::new("/work/.hotload/active/payload")
        );
    }
}
