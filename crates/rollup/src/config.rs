use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RollupError;
use crate::items::PRICE_TAG_PREFIX;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration, usually read from `smeta.toml`.
///
/// Every path may be relative; [`SmetaConfig::resolve_paths`] anchors them to
/// the directory the config file lives in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SmetaConfig {
    /// Corpus root, walked recursively for `.gge` documents.
    pub input_dir: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// NLSR keyword table (xlsx or csv).
    #[serde(default)]
    pub classification: Option<PathBuf>,
    /// TEP coefficient table (xlsx or csv).
    #[serde(default)]
    pub unit_economics: Option<PathBuf>,
    #[serde(default = "default_item_prefix")]
    pub item_prefix: String,
    /// Directory names skipped during discovery, matched case-insensitively.
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
    /// When set, one workbook per document is written here.
    #[serde(default)]
    pub per_document_dir: Option<PathBuf>,
    /// When set, the one-row-per-document LSR summary is written here.
    #[serde(default)]
    pub lsr_summary: Option<PathBuf>,
}

fn default_output() -> PathBuf {
    PathBuf::from("combined_output.xlsx")
}

fn default_item_prefix() -> String {
    PRICE_TAG_PREFIX.to_string()
}

fn default_skip_dirs() -> Vec<String> {
    vec!["OSR".to_string()]
}

impl Default for SmetaConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output: default_output(),
            classification: None,
            unit_economics: None,
            item_prefix: default_item_prefix(),
            skip_dirs: default_skip_dirs(),
            per_document_dir: None,
            lsr_summary: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SmetaConfig {
    pub fn from_toml(input: &str) -> Result<Self, RollupError> {
        let config: SmetaConfig =
            toml::from_str(input).map_err(|e| RollupError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RollupError> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(RollupError::ConfigValidation(
                "input_dir must not be empty".into(),
            ));
        }

        if self.item_prefix.trim().is_empty() {
            return Err(RollupError::ConfigValidation(
                "item_prefix must not be empty".into(),
            ));
        }

        let workbooks = [
            ("output", Some(&self.output)),
            ("lsr_summary", self.lsr_summary.as_ref()),
        ];
        for (field, path) in workbooks {
            let Some(path) = path else { continue };
            let is_xlsx = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
            if !is_xlsx {
                return Err(RollupError::ConfigValidation(format!(
                    "{field} must be an .xlsx file, got '{}'",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Anchor relative paths at `base`. Absolute paths are left alone.
    pub fn resolve_paths(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.input_dir);
        anchor(&mut self.output);
        for path in [
            &mut self.classification,
            &mut self.unit_economics,
            &mut self.per_document_dir,
            &mut self.lsr_summary,
        ]
        .into_iter()
        .flatten()
        {
            anchor(path);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
