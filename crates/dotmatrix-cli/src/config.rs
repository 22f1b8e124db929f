use std::path::{Path, PathBuf};

use dotmatrix_core::{Palette, Rgb};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frames to run when `--frames` is not given.
    pub frames: u64,
    /// Shade colors, lightest first.
    pub palette: [Rgb; 4],
    pub lock_on_illegal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frames: 60,
            palette: Palette::GRAYSCALE.0,
            lock_on_illegal: false,
        }
    }
}

impl Config {
    pub fn palette(&self) -> Palette {
        Palette(self.palette)
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dotmatrix").join("config.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("dotmatrix")
            .join("config.toml");
    }

    PathBuf::from("config.toml")
}

/// Read the config at `path`. A missing file or one that fails to parse
/// yields the defaults.
pub fn load_from_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return Config::default(),
    };

    match toml::from_str::<Config>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse config {}: {e}; using defaults",
                path.display()
            );
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), text).unwrap();
        file
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("nope.toml"));
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.frames, 60);
        assert_eq!(cfg.palette(), Palette::GRAYSCALE);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config("frames = 5\n");
        let cfg = load_from_file(file.path());
        assert_eq!(cfg.frames, 5);
        assert!(!cfg.lock_on_illegal);
        assert_eq!(cfg.palette, Palette::GRAYSCALE.0);
    }

    #[test]
    fn full_file() {
        let file = write_config(
            "frames = 2\n\
             lock_on_illegal = true\n\
             palette = [[224, 248, 208], [136, 192, 112], [52, 104, 86], [8, 24, 32]]\n",
        );
        let cfg = load_from_file(file.path());
        assert_eq!(cfg.frames, 2);
        assert!(cfg.lock_on_illegal);
        assert_eq!(cfg.palette().shade(0), [224, 248, 208]);
        assert_eq!(cfg.palette().shade(3), [8, 24, 32]);
    }

    #[test]
    fn malformed_file_falls_back() {
        let file = write_config("frames = \"many\"\n");
        assert_eq!(load_from_file(file.path()), Config::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config {
            frames: 9,
            ..Config::default()
        };
        let text = toml::to_string_pretty(&cfg).unwrap();
        let file = write_config(&text);
        assert_eq!(load_from_file(file.path()), cfg);
    }
}
