//! Deployment configuration
//!
//! Read from a JSON file (explicit path, or `TRAINING_CARD_CONFIG`), then
//! adjusted by environment variables. Anything not set falls back to the
//! built-in defaults, so the tool runs with no file at all.

use crate::column_resolver::{AliasTable, ColumnResolver, ResolutionMode};
use crate::dataset::LoadOptions;
use crate::error::{CardError, Result};
use crate::fields::Field;
use crate::record_filter::TrackAllowList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "TRAINING_CARD_CONFIG";
pub const DATASET_ENV: &str = "TRAINING_CARD_DATASET";
pub const DATA_DIR_ENV: &str = "TRAINING_CARD_DATA_DIR";
pub const TABLE_ENV: &str = "TRAINING_CARD_TABLE";

/// Name of the sheet every export of the training records is saved under.
pub const DEFAULT_TABLE: &str = "Treinamentos Normativos";

/// Track categories surfaced by default.
pub const DEFAULT_TRACK_ALLOW_LIST: [&str; 3] = ["TRILHA NORMATIVA", "TRILHA SGI", "TRILHA TI"];

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_separator() -> char {
    ','
}

fn default_allow_list() -> Option<Vec<String>> {
    Some(DEFAULT_TRACK_ALLOW_LIST.iter().map(|s| s.to_string()).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File stem looked up inside `data_dir`
    #[serde(default = "default_table")]
    pub table: String,

    /// Explicit dataset file; takes precedence over `data_dir`/`table`
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    #[serde(default = "default_separator")]
    pub csv_separator: char,

    #[serde(default)]
    pub mode: ResolutionMode,

    /// Per-field alias overrides, merged over the standard table
    #[serde(default)]
    pub aliases: BTreeMap<Field, Vec<String>>,

    /// Field -> column table used in fixed mode
    #[serde(default)]
    pub fixed_columns: BTreeMap<Field, String>,

    /// `null` disables track filtering
    #[serde(default = "default_allow_list")]
    pub track_allow_list: Option<Vec<String>>,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            table: default_table(),
            dataset: None,
            csv_separator: default_separator(),
            mode: ResolutionMode::default(),
            aliases: BTreeMap::new(),
            fixed_columns: BTreeMap::new(),
            track_allow_list: default_allow_list(),
        }
    }
}

impl CardConfig {
    /// Load configuration from `path`, `TRAINING_CARD_CONFIG`, or defaults,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CardError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: CardConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dataset) = std::env::var(DATASET_ENV) {
            self.dataset = Some(PathBuf::from(dataset));
        }
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(table) = std::env::var(TABLE_ENV) {
            self.table = table;
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.csv_separator.is_ascii() {
            return Err(CardError::Config(format!(
                "CSV separator must be a single ASCII character, got '{}'",
                self.csv_separator
            )));
        }
        if self.mode == ResolutionMode::Fixed && self.fixed_columns.is_empty() {
            return Err(CardError::Config(
                "Fixed column mode needs a non-empty fixed_columns table".to_string(),
            ));
        }
        Ok(())
    }

    /// Locate the dataset file.
    ///
    /// An explicit `dataset` wins; otherwise `<data_dir>/<table>.parquet`
    /// then `<data_dir>/<table>.csv`.
    pub fn dataset_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.dataset {
            return Ok(path.clone());
        }

        let candidates = [
            self.data_dir.join(format!("{}.parquet", self.table)),
            self.data_dir.join(format!("{}.csv", self.table)),
        ];
        candidates
            .iter()
            .find(|p| p.exists())
            .cloned()
            .ok_or_else(|| {
                let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
                CardError::Config(format!("Dataset not found; tried {}", tried.join(", ")))
            })
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions { csv_separator: self.csv_separator as u8 }
    }

    pub fn resolver(&self) -> ColumnResolver {
        match self.mode {
            ResolutionMode::Aliased => {
                let mut table = AliasTable::standard();
                for (field, aliases) in &self.aliases {
                    table.set_aliases(*field, aliases.clone());
                }
                ColumnResolver::aliased(table)
            }
            ResolutionMode::Fixed => ColumnResolver::fixed(self.fixed_columns.clone()),
        }
    }

    pub fn allow_list(&self) -> Option<TrackAllowList> {
        self.track_allow_list.as_ref().map(|list| TrackAllowList::new(list.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CardConfig::from_json("{}").unwrap();
        assert_eq!(config, CardConfig::default());
        assert_eq!(config.table, "Treinamentos Normativos");
        assert_eq!(config.mode, ResolutionMode::Aliased);
        let allow = config.allow_list().unwrap();
        assert!(allow.contains("TRILHA TI"));
        assert!(allow.contains("TRILHA SGI"));
    }

    #[test]
    fn test_null_allow_list_disables_track_filter() {
        let config = CardConfig::from_json(r#"{"track_allow_list": null}"#).unwrap();
        assert!(config.allow_list().is_none());
    }

    #[test]
    fn test_alias_overrides_merge_over_standard_table() {
        let config = CardConfig::from_json(
            r#"{"aliases": {"identifier": ["MATRICULA", "RE"], "track": []}}"#,
        )
        .unwrap();
        let resolver = config.resolver();
        assert_eq!(resolver.table().aliases(Field::Identifier), &["MATRICULA", "RE"]);
        assert!(resolver.table().aliases(Field::Track).is_empty());
        assert_eq!(resolver.table().aliases(Field::Name), &["NOME", "Nome", "nome"]);
    }

    #[test]
    fn test_fixed_mode() {
        let config = CardConfig::from_json(
            r#"{"mode": "fixed", "fixed_columns": {"identifier": "RE", "admission_date": "ADMISSAO", "name": "NOME"}}"#,
        )
        .unwrap();
        let resolver = config.resolver();
        assert_eq!(resolver.mode(), ResolutionMode::Fixed);
        assert_eq!(resolver.table().aliases(Field::Identifier), &["RE"]);
    }

    #[test]
    fn test_fixed_mode_without_columns_is_rejected() {
        let err = CardConfig::from_json(r#"{"mode": "fixed"}"#).unwrap_err();
        assert!(matches!(err, CardError::Config(_)));
    }

    #[test]
    fn test_non_ascii_separator_is_rejected() {
        let err = CardConfig::from_json(r#"{"csv_separator": "§"}"#).unwrap_err();
        assert!(matches!(err, CardError::Config(_)));
    }

    #[test]
    fn test_explicit_dataset_path_wins() {
        let config = CardConfig {
            dataset: Some(PathBuf::from("/tmp/anything.csv")),
            ..CardConfig::default()
        };
        assert_eq!(config.dataset_path().unwrap(), PathBuf::from("/tmp/anything.csv"));
    }

    #[test]
    fn test_dataset_path_prefers_parquet_then_csv() {
        let dir = std::env::temp_dir().join(format!("training-card-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = CardConfig { data_dir: dir.clone(), ..CardConfig::default() };

        let err = config.dataset_path().unwrap_err();
        assert!(err.to_string().contains("Treinamentos Normativos.parquet"));

        let csv = dir.join("Treinamentos Normativos.csv");
        std::fs::write(&csv, "RE\n1\n").unwrap();
        assert_eq!(config.dataset_path().unwrap(), csv);

        let parquet = dir.join("Treinamentos Normativos.parquet");
        std::fs::write(&parquet, b"").unwrap();
        assert_eq!(config.dataset_path().unwrap(), parquet);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
