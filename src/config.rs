use crate::error::{Result, TsError};
use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Config files tried in order; the first one that exists wins.
pub const CONFIG_PATHS: [&str; 2] = ["./tsmarker.toml", "./tsmarker_config.toml"];

/// Settings for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Write every program to its own file.
    pub split: bool,
    /// Where split output goes. Defaults to a directory named after the input.
    pub output_dir: Option<PathBuf>,
    /// Log progress every this many frames, 0 to disable.
    pub progress_interval: u64,
    /// Check the CRC of every decoded section.
    pub verify_crc: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            split: false,
            output_dir: None,
            progress_interval: 10_000,
            verify_crc: false,
        }
    }
}

impl ScanConfig {
    /// Defaults, then the first config file found, then `TSMARKER_*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        for path in &CONFIG_PATHS {
            if Path::new(path).exists() {
                config = config.merge_file(path)?;
                break;
            }
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overlaid with an explicit file, then the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default().merge_file(path)?;
        config.apply_env()?;
        Ok(config)
    }

    fn merge_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("reading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        self.apply_text(&content)?;
        Ok(self)
    }

    /// Parses `key = "value"` lines over the defaults. `#` starts a comment.
    pub fn from_str_config(content: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_text(content)?;
        Ok(config)
    }

    fn apply_text(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(TsError::Config(format!("expected key = value, got {:?}", line)));
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        for key in ["split", "output_dir", "progress_interval", "verify_crc"] {
            if let Ok(value) = env::var(format!("TSMARKER_{}", key.to_uppercase())) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "split" => self.split = parse_bool(key, value)?,
            "output_dir" => {
                self.output_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "progress_interval" => {
                self.progress_interval = value.parse().map_err(|_| {
                    TsError::Config(format!("progress_interval: {:?} is not a number", value))
                })?
            }
            "verify_crc" => self.verify_crc = parse_bool(key, value)?,
            _ => debug!("ignoring unknown config key {:?}", key),
        }
        Ok(())
    }

    /// Output directory for split files of `input`: `output_dir` when set,
    /// otherwise the input path without its extension.
    pub fn output_dir_for(&self, input: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => input.with_extension(""),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(TsError::Config(format!("{}: {:?} is not a boolean", key, value))),
    }
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# tsmarker configuration

# Write each program to <output_dir>/<pmt_pid>.m2ts
split = "false"

# Defaults to a directory named after the input file
# output_dir = "out"

# Log progress every N frames (0 disables)
progress_interval = "10000"

# Check the CRC of every PSI section
verify_crc = "false"
"#;
        fs::write(path, template)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config_text() {
        let config = ScanConfig::from_str_config(
            r#"
# comment
split = "true"
output_dir = 'programs'
progress_interval = 500
verify_crc = yes
colour = "blue"
"#,
        )
        .unwrap();
        assert_eq!(
            config,
            ScanConfig {
                split: true,
                output_dir: Some(PathBuf::from("programs")),
                progress_interval: 500,
                verify_crc: true,
            }
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ScanConfig::from_str_config("split = maybe"),
            Err(TsError::Config(_))
        ));
        assert!(matches!(
            ScanConfig::from_str_config("progress_interval = often"),
            Err(TsError::Config(_))
        ));
        assert!(matches!(
            ScanConfig::from_str_config("just words"),
            Err(TsError::Config(_))
        ));
    }

    #[test]
    fn test_output_dir_for() {
        let config = ScanConfig::default();
        assert_eq!(
            config.output_dir_for(Path::new("/media/capture.ts")),
            PathBuf::from("/media/capture")
        );
        let config = ScanConfig {
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..ScanConfig::default()
        };
        assert_eq!(
            config.output_dir_for(Path::new("/media/capture.ts")),
            PathBuf::from("/tmp/out")
        );
    }

    #[test]
    fn test_template_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tsmarker.toml");
        create_default_config_template(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            ScanConfig::from_str_config(&content).unwrap(),
            ScanConfig::default()
        );
    }
}
