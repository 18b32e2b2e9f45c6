use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Trailbook";
const APP_NAME: &str = "trailbook";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            self.write_default_config(&default_cfg)?;
            default_cfg.post_load(&self.paths);
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("TRAILBOOK_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("TRAILBOOK_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_dir = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let media_dir = data_dir.join("media");
        let cache_dir = project_dirs.cache_dir().to_path_buf();

        Ok(Self {
            config_dir,
            config_file,
            data_dir,
            media_dir,
            cache_dir,
        })
    }

    /// Lays every directory out under `root`; used by tests and portable installs.
    pub fn rooted(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            media_dir: data_dir.join("media"),
            data_dir,
            cache_dir: root.join("cache"),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.media_dir,
            &self.cache_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub media: MediaOptions,
    pub timeline: TimelineOptions,
    pub inbox: InboxOptions,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.media.resolve(paths);
        if self.media.fetch_timeout_ms == 0 {
            tracing::warn!("media.fetch_timeout_ms of 0 would fail every fetch, using default");
            self.media.fetch_timeout_ms = MediaOptions::default().fetch_timeout_ms;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaOptions {
    /// Directory image refs resolve against; empty means the data dir's `media/`.
    pub root: PathBuf,
    pub fetch_timeout_ms: u64,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            fetch_timeout_ms: 10_000,
        }
    }
}

impl MediaOptions {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.root.as_os_str().is_empty() {
            self.root = paths.media_dir.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineOptions {
    /// How many entries on each side of the selection get their image requested.
    pub prefetch_neighbours: usize,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            prefetch_neighbours: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxOptions {
    pub mark_read_on_open: bool,
}

impl Default for InboxOptions {
    fn default() -> Self {
        Self {
            mark_read_on_open: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted(temp.path());
        let loader = ConfigLoader::with_paths(paths.clone());

        let cfg = loader.load_or_init()?;
        assert!(paths.config_file.exists());
        assert!(paths.media_dir.is_dir());
        assert_eq!(cfg.media.root, paths.media_dir);
        assert_eq!(cfg.timeline.prefetch_neighbours, 1);

        let written = fs::read_to_string(&paths.config_file)?;
        assert!(!written.contains(&paths.media_dir.display().to_string()));
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults_and_fixes_zero_timeout() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[media]\nroot = \"/srv/photos\"\nfetch_timeout_ms = 0\n\n[inbox]\nmark_read_on_open = false\n",
        )?;

        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.media.root, PathBuf::from("/srv/photos"));
        assert_eq!(cfg.media.fetch_timeout(), Duration::from_secs(10));
        assert!(!cfg.inbox.mark_read_on_open);
        assert_eq!(cfg.timeline.prefetch_neighbours, 1);
        Ok(())
    }
}
