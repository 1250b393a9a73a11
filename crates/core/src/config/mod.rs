use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration, usually loaded from a JSON preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub remap: KeyRemapParams,
    pub holds: HoldNoteParams,
    /// Where converted charts are written. `None` writes next to the source.
    pub output_dir: Option<PathBuf>,
    /// Worker threads for batch runs. 0 uses the available parallelism.
    pub threads: usize,
}

impl ToolkitConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Parameters of a key-count conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyRemapParams {
    /// Key count of the converted chart.
    pub target_keys: usize,
    /// Duplicated columns whose copy is dropped, leaving a silent lane.
    pub blank: usize,
    /// Area length control. 0 keeps one column mapping for the whole chart.
    pub gap: f64,
    /// Beat subdivision used when removing notes that crowd the previous
    /// area's duplicates.
    pub clean: u32,
    pub seed: Option<String>,
    /// Source key counts that may be converted. Empty allows all.
    pub allowed_keys: Vec<usize>,
    /// Replacement creator name. `None` appends the tool name instead.
    pub creator: Option<String>,
}

impl Default for KeyRemapParams {
    fn default() -> Self {
        Self {
            target_keys: 7,
            blank: 0,
            gap: 0.0,
            clean: 0,
            seed: None,
            allowed_keys: Vec::new(),
            creator: None,
        }
    }
}

impl KeyRemapParams {
    /// Milliseconds of chart time accumulated before the column mapping is
    /// re-rolled. A gap of 0 never re-rolls.
    pub fn gap_threshold_ms(&self) -> f64 {
        if self.gap == 0.0 {
            f64::INFINITY
        } else {
            29998.8584 * (-0.3176 * self.gap).exp() + 347.7248
        }
    }
}

/// Secondary duration profile mixed into the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendProfile {
    pub divide: f64,
    pub level: i32,
    /// Percentage of notes that keep the primary profile.
    pub mix: f64,
}

/// Parameters of a tap/hold density transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldNoteParams {
    /// Density level, -3 to 10.
    pub level: i32,
    /// Chance in percent that an eligible note becomes a hold.
    pub percent: f64,
    /// Beat subdivision hold lengths snap to.
    pub divide: f64,
    /// Columns that keep holds at a time. 0 keeps all.
    pub columns: usize,
    /// Time-groups between re-rolls of the active columns. 0 never re-rolls.
    pub window: usize,
    pub overall_difficulty: Option<f64>,
    pub preserve_holds: bool,
    pub fix_grid_error: bool,
    pub skip_converted: bool,
    pub blend: Option<BlendProfile>,
    pub seed: Option<String>,
    pub allowed_keys: Vec<usize>,
    pub creator: Option<String>,
}

impl Default for HoldNoteParams {
    fn default() -> Self {
        Self {
            level: 3,
            percent: 100.0,
            divide: 4.0,
            columns: 0,
            window: 0,
            overall_difficulty: None,
            preserve_holds: false,
            fix_grid_error: false,
            skip_converted: false,
            blend: None,
            seed: None,
            allowed_keys: Vec::new(),
            creator: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_zero_never_flushes() {
        let params = KeyRemapParams::default();
        assert!(params.gap_threshold_ms().is_infinite());
    }

    #[test]
    fn gap_threshold_decays_with_gap() {
        let short = KeyRemapParams {
            gap: 10.0,
            ..Default::default()
        };
        let long = KeyRemapParams {
            gap: 1.0,
            ..Default::default()
        };
        assert!(short.gap_threshold_ms() < long.gap_threshold_ms());
        assert!((long.gap_threshold_ms() - 22183.7).abs() < 1.0);
    }

    #[test]
    fn partial_presets_fill_defaults() {
        let config: ToolkitConfig =
            serde_json::from_str(r#"{ "remap": { "target_keys": 8, "seed": "x" }, "threads": 2 }"#)
                .unwrap();
        assert_eq!(config.remap.target_keys, 8);
        assert_eq!(config.remap.seed.as_deref(), Some("x"));
        assert_eq!(config.remap.blank, 0);
        assert_eq!(config.holds, HoldNoteParams::default());
        assert_eq!(config.threads, 2);
    }

    #[test]
    fn loads_presets_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preset.json");
        fs::write(&path, r#"{ "holds": { "level": 10, "blend": { "divide": 8, "level": 2, "mix": 50 } } }"#)
            .unwrap();
        let config = ToolkitConfig::from_path(&path).unwrap();
        assert_eq!(config.holds.level, 10);
        assert_eq!(config.holds.blend.map(|b| b.level), Some(2));

        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            ToolkitConfig::from_path(&path),
            Err(crate::ToolkitError::Preset(_))
        ));
    }
}
