use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "config.yml";

/// A configured app: where its source lives and how to build it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub build: Vec<String>,
    #[serde(default, rename = "dest", skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

impl App {
    /// The checkout location: `dest` when set and non-empty, otherwise
    /// `<config_dir>/<name>`.
    pub fn destination(&self, config_dir: &Path) -> PathBuf {
        match &self.destination {
            Some(dest) if !dest.as_os_str().is_empty() => dest.clone(),
            _ => config_dir.join(&self.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dl: Vec<App>,
}

#[derive(Debug, Error)]
#[error("couldn't find app '{0}' in config")]
pub struct AppNotFound(pub String);

impl Config {
    /// First app whose name matches exactly.
    pub fn resolve(&self, name: &str) -> Result<&App, AppNotFound> {
        self.dl
            .iter()
            .find(|app| app.name == name)
            .ok_or_else(|| AppNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dl.iter().map(|app| app.name.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't load app #{index}: missing name")]
    MissingName { index: usize },
    #[error("couldn't load app '{app}': blank build instruction at position {position}")]
    BlankInstruction { app: String, position: usize },
}

/// Location of the config directory and the YAML file inside it.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub dir: PathBuf,
    pub file: PathBuf,
}

impl ConfigPaths {
    pub fn new(dir: PathBuf) -> Self {
        let file = dir.join(CONFIG_FILE_NAME);
        Self { dir, file }
    }

    /// Uses `dir_override` if given, otherwise `<platform config dir>/dl`.
    pub fn resolve(dir_override: Option<PathBuf>) -> anyhow::Result<Self> {
        let dir = match dir_override {
            Some(dir) => dir,
            None => dirs::config_dir()
                .ok_or_else(|| anyhow!("couldn't determine platform config directory"))?
                .join("dl"),
        };
        Ok(Self::new(dir))
    }

    /// Create the directory and an empty config file if they are missing.
    pub fn ensure(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating config directory {}", self.dir.display()))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)
            .with_context(|| format!("creating config file {}", self.file.display()))?;
        Ok(())
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let config = parse_config(&data).with_context(|| format!("parsing config at {}", path.display()))?;
    validate_config(config).with_context(|| format!("validating config at {}", path.display()))
}

fn parse_config(data: &str) -> Result<Config, serde_yaml::Error> {
    if data.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(data)
}

fn validate_config(config: Config) -> Result<Config, ConfigError> {
    let mut seen = HashSet::new();

    for (index, app) in config.dl.iter().enumerate() {
        if app.name.is_empty() {
            return Err(ConfigError::MissingName { index });
        }

        if let Some(position) = app.build.iter().position(|line| line.trim().is_empty()) {
            return Err(ConfigError::BlankInstruction {
                app: app.name.clone(),
                position,
            });
        }

        if !seen.insert(app.name.as_str()) {
            tracing::warn!(
                app = %app.name,
                "duplicate app name in config, only the first entry will be used"
            );
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::{App, Config, ConfigError, ConfigPaths, load_config, parse_config, validate_config};
    use std::path::{Path, PathBuf};

    fn app(name: &str, url: &str) -> App {
        App {
            name: name.to_string(),
            url: url.to_string(),
            build: Vec::new(),
            destination: None,
        }
    }

    #[test]
    fn resolve_picks_exact_name() {
        let config = Config {
            dl: vec![app("foo", "a"), app("Foo", "b"), app("foobar", "c")],
        };

        assert_eq!(config.resolve("Foo").unwrap().url, "b");
        assert_eq!(config.resolve("foo").unwrap().url, "a");
        assert!(config.resolve("fo").is_err());
        assert!(config.resolve(" foo").is_err());
    }

    #[test]
    fn resolve_prefers_first_duplicate() {
        let config = Config {
            dl: vec![app("foo", "first"), app("foo", "second")],
        };

        assert_eq!(config.resolve("foo").unwrap().url, "first");
    }

    #[test]
    fn resolve_reports_missing_name() {
        let err = Config::default().resolve("ghost").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn destination_falls_back_to_config_dir() {
        let mut foo = app("foo", "https://example/foo.git");
        assert_eq!(foo.destination(Path::new("/tmp/cfg")), PathBuf::from("/tmp/cfg/foo"));

        foo.destination = Some(PathBuf::new());
        assert_eq!(foo.destination(Path::new("/tmp/cfg")), PathBuf::from("/tmp/cfg/foo"));

        foo.destination = Some(PathBuf::from("/opt/foo"));
        assert_eq!(foo.destination(Path::new("/tmp/cfg")), PathBuf::from("/opt/foo"));
    }

    #[test]
    fn parses_yaml_config() {
        let config = parse_config(
            "dl:\n  - name: foo\n    url: https://example/foo.git\n    build:\n      - make\n      - make install\n    dest: /opt/foo\n  - name: bar\n    url: https://example/bar.git\n",
        )
        .expect("config should parse");

        assert_eq!(config.dl.len(), 2);
        assert_eq!(config.dl[0].build, vec!["make", "make install"]);
        assert_eq!(config.dl[0].destination, Some(PathBuf::from("/opt/foo")));
        assert!(config.dl[1].build.is_empty());
        assert_eq!(config.dl[1].destination, None);
    }

    #[test]
    fn empty_file_is_empty_config() {
        assert_eq!(parse_config("").unwrap(), Config::default());
        assert_eq!(parse_config("  \n").unwrap(), Config::default());
    }

    #[test]
    fn rejects_blank_instructions() {
        let mut foo = app("foo", "u");
        foo.build = vec!["make".to_string(), "   ".to_string()];
        let err = validate_config(Config { dl: vec![foo] }).expect_err("config should be invalid");
        assert!(matches!(err, ConfigError::BlankInstruction { position: 1, .. }));
    }

    #[test]
    fn rejects_nameless_apps() {
        let err = validate_config(Config { dl: vec![app("", "u")] }).expect_err("config should be invalid");
        assert!(matches!(err, ConfigError::MissingName { index: 0 }));
    }

    #[test]
    fn ensure_creates_directory_and_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let paths = ConfigPaths::new(dir.path().join("dl"));

        paths.ensure().expect("ensure should succeed");
        assert!(paths.file.is_file());

        std::fs::write(&paths.file, "dl:\n  - name: foo\n").unwrap();
        paths.ensure().expect("ensure should keep existing file");
        let config = load_config(&paths.file).expect("config should load");
        assert_eq!(config.names().collect::<Vec<_>>(), vec!["foo"]);
    }

    #[test]
    fn load_config_adds_path_context() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let file = dir.path().join("config.yml");
        std::fs::write(&file, "dl: [unterminated").unwrap();

        let err = load_config(&file).expect_err("should surface parse errors");
        assert!(err.to_string().contains("parsing config"));
    }
}
