//! Service configuration.
//!
//! Loaded from a TOML file; every key is optional and unknown keys are
//! rejected.
//!
//! ```toml
//! [pipeline]
//! output_format = "png"
//! deadline_ms = 30000   # 0 disables the deadline
//! max_steps = 64
//!
//! [codec]
//! max_pixels = 40000000
//! apply_exif_orientation = false
//!
//! [files]
//! storage_dir = "images"
//! default_quality = 85
//! resize_quality = 90
//! convert_quality = 95
//!
//! [logging]
//! filter = "info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pixelflow_core::{CodecLimits, FileSettings, OutputFormat, PipelineConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub pipeline: PipelineSection,
    pub codec: CodecSection,
    pub files: FilesSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub output_format: OutputFormat,
    pub deadline_ms: u64,
    pub max_steps: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Png,
            deadline_ms: 30_000,
            max_steps: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecSection {
    pub max_pixels: u64,
    pub apply_exif_orientation: bool,
}

impl Default for CodecSection {
    fn default() -> Self {
        let limits = CodecLimits::default();
        Self {
            max_pixels: limits.max_pixels,
            apply_exif_orientation: limits.apply_exif_orientation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesSection {
    /// Directory backing the image store.
    pub storage_dir: PathBuf,
    /// Compress quality when the request gives none.
    pub default_quality: u8,
    pub resize_quality: u8,
    pub convert_quality: u8,
}

impl Default for FilesSection {
    fn default() -> Self {
        let settings = FileSettings::default();
        Self {
            storage_dir: PathBuf::from("images"),
            default_quality: settings.compress_quality,
            resize_quality: settings.resize_quality,
            convert_quality: settings.convert_quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_steps == 0 {
            return Err(ConfigError::Validation(
                "pipeline.max_steps must be at least 1".into(),
            ));
        }
        if self.codec.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "codec.max_pixels must be at least 1".into(),
            ));
        }
        for (name, quality) in [
            ("files.default_quality", self.files.default_quality),
            ("files.resize_quality", self.files.resize_quality),
            ("files.convert_quality", self.files.convert_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::Validation(format!("{name} must be 1-100")));
            }
        }
        if let Err(err) = EnvFilter::try_new(&self.logging.filter) {
            return Err(ConfigError::Validation(format!(
                "logging.filter is not a valid filter: {err}"
            )));
        }
        Ok(())
    }

    pub fn codec_limits(&self) -> CodecLimits {
        CodecLimits {
            max_pixels: self.codec.max_pixels,
            apply_exif_orientation: self.codec.apply_exif_orientation,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            output_format: self.pipeline.output_format,
            deadline: (self.pipeline.deadline_ms > 0)
                .then(|| Duration::from_millis(self.pipeline.deadline_ms)),
            max_steps: self.pipeline.max_steps,
            codec: self.codec_limits(),
        }
    }

    pub fn file_settings(&self) -> FileSettings {
        FileSettings {
            compress_quality: self.files.default_quality,
            resize_quality: self.files.resize_quality,
            convert_quality: self.files.convert_quality,
            codec: self.codec_limits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = ServiceConfig::load(&tmp.path().join("pixelflow.toml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.pipeline_config(), PipelineConfig::default());
        assert_eq!(config.file_settings(), FileSettings::default());
    }

    #[test]
    fn test_load_reads_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pixelflow.toml");
        fs::write(
            &path,
            r#"
[pipeline]
deadline_ms = 0
max_steps = 8

[files]
storage_dir = "/srv/images"
"#,
        )
        .unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.deadline, None);
        assert_eq!(pipeline.max_steps, 8);
        assert_eq!(config.files.storage_dir, PathBuf::from("/srv/images"));
        // Unspecified values keep their defaults
        assert_eq!(config.files.convert_quality, 95);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = ServiceConfig::from_toml_str("[pipeline]\nmax_stpes = 3\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let result = ServiceConfig::from_toml_str("this is not valid toml [[[");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_out_of_range_values_fail_validation() {
        for content in [
            "[pipeline]\nmax_steps = 0\n",
            "[codec]\nmax_pixels = 0\n",
            "[files]\ndefault_quality = 0\n",
            "[files]\nconvert_quality = 101\n",
            "[logging]\nfilter = \"pixelflow=notalevel\"\n",
        ] {
            let result = ServiceConfig::from_toml_str(content);
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "{content}: {result:?}"
            );
        }
    }

    #[test]
    fn test_output_format_accepts_jpg_alias() {
        let config = ServiceConfig::from_toml_str("[pipeline]\noutput_format = \"jpg\"\n").unwrap();
        assert_eq!(config.pipeline.output_format, OutputFormat::Jpeg);
    }
}
