use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "stylescope.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Stylescope configuration file format. Paths are relative to the
/// directory holding the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Source directory containing .st.css files
    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Directories searched for package imports, in order
    #[serde(default)]
    pub module_dirs: Vec<String>,

    /// Stylesheet path → namespace, overriding derived namespaces
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,

    /// Drop rules that only style stylesheets unreachable from `entries`
    #[serde(default)]
    pub optimize: bool,

    /// Entry stylesheets for reachability; every source file when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<String>,
}

fn default_src_dir() -> String {
    "src".to_string()
}

fn default_out_dir() -> String {
    "dist".to_string()
}

impl Config {
    /// Load config from a directory, falling back to defaults when there is
    /// no config file
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join(DEFAULT_CONFIG_NAME);
        let display = config_path.display().to_string();

        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn src_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.src_dir)
    }

    pub fn out_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.out_dir)
    }

    pub fn module_dirs(&self, root: &Path) -> Vec<PathBuf> {
        self.module_dirs.iter().map(|dir| root.join(dir)).collect()
    }

    pub fn namespaces(&self, root: &Path) -> Vec<(PathBuf, String)> {
        self.namespaces
            .iter()
            .map(|(path, namespace)| (root.join(path), namespace.clone()))
            .collect()
    }

    pub fn entries(&self, root: &Path) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| root.join(entry)).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            out_dir: default_out_dir(),
            module_dirs: Vec::new(),
            namespaces: BTreeMap::new(),
            optimize: false,
            entries: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "srcDir": "styles",
            "outDir": "lib",
            "moduleDirs": ["node_modules"],
            "namespaces": { "styles/main.st.css": "Main" },
            "optimize": true,
            "entries": ["styles/main.st.css"]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.src_dir, "styles");
        assert_eq!(config.out_dir, "lib");
        assert_eq!(config.module_dirs, vec!["node_modules"]);
        assert!(config.optimize);

        let root = Path::new("/project");
        assert_eq!(
            config.namespaces(root),
            vec![(PathBuf::from("/project/styles/main.st.css"), "Main".to_string())]
        );
        assert_eq!(config.entries(root), vec![PathBuf::from("/project/styles/main.st.css")]);
    }

    #[test]
    fn test_default_config() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.src_dir, "src");
        assert_eq!(config.out_dir, "dist");
        assert!(!config.optimize);
    }

    #[test]
    fn test_load_reports_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ nope").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::Parse { .. })));

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(empty.path()).unwrap(), Config::default());
    }
}
