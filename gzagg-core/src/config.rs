use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::codec::CodecId;
use crate::error::{AggError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "Aggregator.json";
/// Token in `files_location` replaced by the process working directory.
pub const WORKING_DIRECTORY_PLACEHOLDER: &str = "#wd";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    Directory { location: PathBuf },
    Memory,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Directory {
            location: PathBuf::from("aggregated"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub files_location: String,
    pub max_workers: usize,
    /// Subtracted from every on-disk size to estimate the payload size.
    pub gzip_avg_header_size: i64,
    pub save_files_to_disk: bool,
    pub local_folder_location: PathBuf,
    /// Upper bound in bytes for a batch before it is sealed.
    pub max_aggregated_file_size: u64,
    pub truncate_every_run: bool,
    /// Suffix filter applied to catalog entries; also selects the input codec.
    pub extension: String,
    pub batch_codec: CodecId,
    pub compression_level: i32,
    pub sink: SinkConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            files_location: format!("{WORKING_DIRECTORY_PLACEHOLDER}/files"),
            max_workers: 4,
            gzip_avg_header_size: 20,
            save_files_to_disk: false,
            local_folder_location: PathBuf::from("output"),
            max_aggregated_file_size: 10 * 1024 * 1024,
            truncate_every_run: false,
            extension: ".gz".to_string(),
            batch_codec: CodecId::Gzip,
            compression_level: 6,
            sink: SinkConfig::default(),
        }
    }
}

impl AggregatorConfig {
    /// Read, resolve and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path)
            .map_err(|e| AggError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut cfg: AggregatorConfig = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| AggError::Config(format!("cannot parse {}: {e}", path.display())))?;
        cfg.resolve_placeholders()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `Aggregator.json` in the current working directory.
    pub fn load_default() -> Result<Self> {
        let wd = std::env::current_dir()?;
        Self::load(&wd.join(DEFAULT_CONFIG_FILE))
    }

    pub fn resolve_placeholders(&mut self) -> Result<()> {
        if self.files_location.contains(WORKING_DIRECTORY_PLACEHOLDER) {
            let wd = std::env::current_dir()?;
            self.files_location = self.files_location.replacen(
                WORKING_DIRECTORY_PLACEHOLDER,
                &wd.to_string_lossy(),
                1,
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(AggError::Config("max_workers must be at least 1".into()));
        }
        if self.max_aggregated_file_size == 0 {
            return Err(AggError::Config(
                "max_aggregated_file_size must be positive".into(),
            ));
        }
        if self.files_location.trim().is_empty() {
            return Err(AggError::Config("files_location is empty".into()));
        }
        CodecId::from_suffix(&self.extension)?;
        Ok(())
    }

    pub fn files_root(&self) -> PathBuf {
        PathBuf::from(&self.files_location)
    }

    pub fn input_codec(&self) -> Result<CodecId> {
        CodecId::from_suffix(&self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_original_keys_and_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut f = File::create(&path).unwrap();
        write!(
            f,
            r#"{{
                "files_location": "/data/in",
                "max_workers": 8,
                "gzip_avg_header_size": 30,
                "save_files_to_disk": true,
                "local_folder_location": "/data/out",
                "max_aggregated_file_size": 1048576,
                "truncate_every_run": true,
                "sink": {{ "kind": "directory", "location": "/data/db" }}
            }}"#
        )
        .unwrap();
        drop(f);

        let cfg = AggregatorConfig::load(&path).unwrap();
        assert_eq!(cfg.files_location, "/data/in");
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.gzip_avg_header_size, 30);
        assert!(cfg.save_files_to_disk);
        assert!(cfg.truncate_every_run);
        assert_eq!(cfg.max_aggregated_file_size, 1 << 20);
        assert_eq!(cfg.extension, ".gz");
        assert_eq!(cfg.batch_codec, CodecId::Gzip);
        assert_eq!(
            cfg.sink,
            SinkConfig::Directory {
                location: PathBuf::from("/data/db")
            }
        );
    }

    #[test]
    fn working_directory_placeholder_is_replaced() {
        let mut cfg = AggregatorConfig {
            files_location: "#wd/logs".into(),
            ..Default::default()
        };
        cfg.resolve_placeholders().unwrap();
        let wd = std::env::current_dir().unwrap();
        assert_eq!(cfg.files_location, format!("{}/logs", wd.to_string_lossy()));
    }

    #[test]
    fn rejects_zero_workers() {
        let cfg = AggregatorConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(AggError::Config(_))));
    }

    #[test]
    fn rejects_unknown_extension() {
        let cfg = AggregatorConfig {
            extension: ".bz2".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, b"{ \"max_workers\": \"many\" }").unwrap();
        assert!(matches!(
            AggregatorConfig::load(&path),
            Err(AggError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AggregatorConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AggError::Config(_)));
    }
}
