use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub debug: bool,
    /// Debug log destination; empty selects the default under
    /// ~/.local/share/sh-expand.
    #[serde(default)]
    pub log_file: String,
}

/// Which oracle backend a session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Bash,
    Builtin,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    pub backend: Backend,
    pub shell: String,
    #[serde(default)]
    pub shell_args: Vec<String>,
    pub sentinel: String,
    pub timeout_ms: u64,
    #[serde(default)]
    pub temp_dir: String,
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Directory for the mirror file, `None` for the system default.
    pub fn temp_dir(&self) -> Option<PathBuf> {
        expand_path(&self.temp_dir)
    }
}

impl Settings {
    /// Resolved debug log path.
    pub fn log_path(&self) -> Option<PathBuf> {
        expand_path(&self.log_file).or_else(|| {
            let home = std::env::var_os("HOME")?;
            Some(PathBuf::from(home).join(".local/share/sh-expand/expand.log"))
        })
    }
}

fn expand_path(raw: &str) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    Some(PathBuf::from(shellexpand::tilde(raw).into_owned()))
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    oracle: OracleOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    debug: Option<bool>,
    log_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OracleOverlay {
    #[serde(default)]
    replace: bool,
    backend: Option<Backend>,
    shell: Option<String>,
    #[serde(default)]
    shell_args: Vec<String>,
    #[serde(default)]
    remove_shell_args: Vec<String>,
    sentinel: Option<String>,
    timeout_ms: Option<u64>,
    temp_dir: Option<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Embedded defaults with the user overlay from
    /// ~/.config/sh-expand/config.toml merged on top, if present.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    fn load_overlay() -> Option<ConfigOverlay> {
        let home = std::env::var_os("HOME")?;
        let path = std::path::Path::new(&home).join(".config/sh-expand/config.toml");
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("sh-expand: config parse error: {e}");
                None
            }
        }
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        if let Some(v) = s.debug {
            self.settings.debug = v;
        }
        if let Some(v) = s.log_file {
            self.settings.log_file = v;
        }

        let o = overlay.oracle;
        if let Some(v) = o.backend {
            self.oracle.backend = v;
        }
        if let Some(v) = o.shell {
            self.oracle.shell = v;
        }
        merge_list(
            &mut self.oracle.shell_args,
            o.shell_args,
            &o.remove_shell_args,
            o.replace,
        );
        if let Some(v) = o.sentinel {
            self.oracle.sentinel = v;
        }
        if let Some(v) = o.timeout_ms {
            self.oracle.timeout_ms = v;
        }
        if let Some(v) = o.temp_dir {
            self.oracle.temp_dir = v;
        }
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
