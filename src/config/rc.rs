use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::document_model::document::{DEFAULT_CHUNK_CAPACITY, MIN_CHUNK_CAPACITY};
use crate::document_model::{DocumentOptions, LineEnding};

const RC_FILE_NAME: &str = ".textchainrc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcConfig {
    pub chunk_size: usize,
    pub tab_stop: usize,
    pub expand_tab: bool,
    pub undo_levels: usize,
    pub line_ending: String,
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_CAPACITY,
            tab_stop: 4,
            expand_tab: false,
            undo_levels: 1000,
            line_ending: "unix".to_string(),
        }
    }
}

impl RcConfig {
    pub fn line_ending(&self) -> LineEnding {
        match self.line_ending.as_str() {
            "dos" => LineEnding::Windows,
            "mac" => LineEnding::Mac,
            _ => LineEnding::Unix,
        }
    }

    /// The options new documents are created with.
    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            chunk_capacity: self.chunk_size,
            tab_width: self.tab_stop,
            undo_levels: self.undo_levels,
            line_ending: self.line_ending(),
            expand_tab: self.expand_tab,
        }
    }
}

pub struct RcLoader;

impl RcLoader {
    /// Get the path to the RC file
    /// Looks for .textchainrc in:
    /// 1. Current directory
    /// 2. Home directory (~/.textchainrc)
    pub fn get_rc_path() -> Option<PathBuf> {
        let current_rc = Path::new(RC_FILE_NAME);
        if current_rc.exists() {
            return Some(current_rc.to_path_buf());
        }

        if let Ok(home) = env::var("HOME") {
            let home_rc = Path::new(&home).join(RC_FILE_NAME);
            if home_rc.exists() {
                return Some(home_rc);
            }
        }

        None
    }

    /// Load and parse the RC file, falling back to defaults.
    pub fn load_config() -> RcConfig {
        match Self::get_rc_path() {
            Some(rc_path) => Self::load_from(&rc_path),
            None => RcConfig::default(),
        }
    }

    pub fn load_from(rc_path: &Path) -> RcConfig {
        let mut config = RcConfig::default();
        match fs::read_to_string(rc_path) {
            Ok(content) => {
                Self::parse_config_content(&content, &mut config);
                debug!(path = %rc_path.display(), ?config, "loaded rc file");
            }
            Err(error) => {
                warn!(path = %rc_path.display(), %error, "cannot read rc file, using defaults");
            }
        }
        config
    }

    /// Parse the content of an RC file
    pub fn parse_config_content(content: &str, config: &mut RcConfig) {
        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') || line.starts_with('"') {
                continue;
            }

            Self::parse_config_line(line, config);
        }
    }

    fn parse_config_line(line: &str, config: &mut RcConfig) {
        // Remove inline comments
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        }
        .trim();

        if let Some(stripped) = line.strip_prefix("set ") {
            let setting = stripped.trim();
            match setting {
                "expandtab" | "et" => config.expand_tab = true,
                "noexpandtab" | "noet" => config.expand_tab = false,
                _ => {
                    if let Some((key, value)) = setting.split_once('=') {
                        Self::apply_setting(key.trim(), value.trim(), config);
                    }
                }
            }
        } else if let Some((key, value)) = line.split_once('=') {
            Self::apply_setting(key.trim(), value.trim(), config);
        }
    }

    fn apply_setting(key: &str, value: &str, config: &mut RcConfig) {
        match key {
            "chunksize" | "chunk_size" => {
                if let Ok(size) = value.parse::<usize>() {
                    if size >= MIN_CHUNK_CAPACITY {
                        config.chunk_size = size;
                    }
                }
            }
            "tabstop" | "tab_stop" | "ts" => {
                if let Ok(tab_stop) = value.parse::<usize>() {
                    if tab_stop > 0 && tab_stop <= 16 {
                        config.tab_stop = tab_stop;
                    }
                }
            }
            "undolevels" | "undo_levels" | "ul" => {
                if let Ok(levels) = value.parse::<usize>() {
                    if levels > 0 {
                        config.undo_levels = levels;
                    }
                }
            }
            "expandtab" | "expand_tab" => {
                config.expand_tab = value == "true" || value == "1" || value == "yes";
            }
            "fileformat" | "line_ending" | "ff" => match value {
                "unix" | "dos" | "mac" => config.line_ending = value.to_string(),
                _ => {} // Invalid value, ignore
            },
            _ => {} // Unknown setting, ignore
        }
    }

    /// Generate a sample RC file content
    pub fn generate_sample_rc() -> String {
        r#"# textchain configuration file (.textchainrc)
# Lines starting with # or " are comments

# Storage
set chunksize=4096     # Bytes per text chunk (minimum 16)
set undolevels=1000    # Maximum number of undoable edits

# Tab settings
set tabstop=4          # Display width of a tab
set expandtab          # Indent with spaces (or set noexpandtab)

# File format
set fileformat=unix    # Line endings for new files: unix, dos, or mac

# Alternative key=value syntax:
# chunk_size=4096
# tab_stop=4
# expand_tab=true
# line_ending=unix
"#
        .to_string()
    }
}
