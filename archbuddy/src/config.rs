//! Persistent application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

/// Screen rectangle in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Where the inventory grid sits on a 16:9 screen of the given height.
    pub fn default_for_screen(screen_height: u32) -> Self {
        let h = screen_height as f32;
        Self {
            x: (0.1 * h) as u32,
            y: (0.3 * h) as u32,
            width: (0.41 * h) as u32,
            height: (0.41 * h) as u32,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Rect {
    type Err = anyhow::Error;

    /// Parses `x y width height`, separated by spaces and/or commas.
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<u32>().with_context(|| format!("invalid number {v:?}")))
            .collect::<Result<Vec<_>>>()?;

        let [x, y, width, height] = parts[..] else {
            bail!("expected four numbers (x y width height), got {}", parts.len());
        };
        ensure!(width > 0 && height > 0, "scanner window must not be empty");
        Ok(Self { x, y, width, height })
    }
}

/// On-disk configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inventory region to scan. Derived from the screen height when unset.
    pub scanner_window: Option<Rect>,

    /// Template scale. Derived from the screen height when unset.
    pub image_scale: Option<f32>,

    /// Minimum correlation score for a finding.
    pub confidence_threshold: f32,

    /// Also list every scanned item, not just the craftable ones.
    pub display_inventory_items: bool,

    /// Requested combos, highest priority first.
    pub combos: Vec<Vec<String>>,

    /// Abort when a reference picture is missing or corrupt instead of
    /// scanning without that item.
    pub strict_templates: bool,
}

impl Default for Config {
    fn default() -> Self {
        let combos: [[&str; 4]; 4] = [
            ["Innocence-Touched", "Brine King-Touched", "Kitava-Touched", "Treant Horde"],
            ["Mirror Image", "Assassin", "Rejuvenating", "Treant Horde"],
            ["Innocence-Touched", "Brine King-Touched", "Kitava-Touched", "Treant Horde"],
            ["Arakaali-Touched", "Brine King-Touched", "Effigy", "Treant Horde"],
        ];

        Self {
            scanner_window: None,
            image_scale: None,
            confidence_threshold: ie::DEFAULT_CONFIDENCE_THRESHOLD,
            display_inventory_items: false,
            combos: combos
                .iter()
                .map(|c| c.iter().map(|v| v.to_string()).collect())
                .collect(),
            strict_templates: true,
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("archbuddy.json"))
    }

    /// Load configuration from disk, falling back to defaults on error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load config; using defaults");
                Self::default()
            }
        }
    }

    /// Try to load configuration from disk. A missing file yields defaults.
    pub fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    /// Save configuration to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    pub fn scanner_window_for(&self, screen_height: u32) -> Rect {
        self.scanner_window
            .unwrap_or_else(|| Rect::default_for_screen(screen_height))
    }

    pub fn image_scale_for(&self, screen_height: u32) -> f32 {
        self.image_scale
            .unwrap_or_else(|| ie::default_scale(screen_height))
    }

    pub fn set_image_scale(&mut self, scale: f32) -> Result<()> {
        ensure!(scale.is_finite() && scale > 0.0, "image scale must be positive, got {scale}");
        self.image_scale = Some(scale);
        Ok(())
    }

    pub fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        ensure!(
            threshold > 0.0 && threshold <= 1.0,
            "confidence threshold must be in (0, 1], got {threshold}"
        );
        self.confidence_threshold = threshold;
        Ok(())
    }

    /// Every combo must name known items only.
    pub fn validate_combos(&self, catalog: &data::Catalog) -> Result<()> {
        for (i, combo) in self.combos.iter().enumerate() {
            catalog
                .validate_combo(combo)
                .with_context(|| format!("combo #{} in config", i + 1))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_with_commas_or_spaces() {
        let expected = Rect { x: 144, y: 432, width: 590, height: 590 };
        assert_eq!("144 432 590 590".parse::<Rect>().unwrap(), expected);
        assert_eq!("144, 432, 590, 590".parse::<Rect>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<Rect>().unwrap(), expected);
    }

    #[test]
    fn rejects_bad_windows() {
        assert!("1 2 3".parse::<Rect>().is_err());
        assert!("1 2 3 4 5".parse::<Rect>().is_err());
        assert!("a b c d".parse::<Rect>().is_err());
        assert!("1 2 0 4".parse::<Rect>().is_err());
    }

    #[test]
    fn default_window_scales_with_screen() {
        assert_eq!(
            Rect::default_for_screen(1440),
            Rect { x: 144, y: 432, width: 590, height: 590 }
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"confidence_threshold": 0.9}"#).unwrap();
        assert_eq!(cfg.confidence_threshold, 0.9);
        assert_eq!(cfg.combos, Config::default().combos);
        assert!(cfg.strict_templates);
        assert_eq!(cfg.image_scale_for(1440), ie::default_scale(1440));
    }

    #[test]
    fn json_round_trip() {
        let mut cfg = Config::default();
        cfg.scanner_window = Some(Rect { x: 1, y: 2, width: 3, height: 4 });
        cfg.set_image_scale(0.75).unwrap();
        let back: Config = serde_json::from_str(&serde_json::to_string(&cfg).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn setters_validate() {
        let mut cfg = Config::default();
        assert!(cfg.set_image_scale(0.0).is_err());
        assert!(cfg.set_confidence_threshold(1.2).is_err());
        assert!(cfg.set_confidence_threshold(0.0).is_err());
        cfg.set_confidence_threshold(1.0).unwrap();
        assert_eq!(cfg.confidence_threshold, 1.0);
    }

    #[test]
    fn default_combos_are_known_items() {
        let catalog = data::Catalog::archnemesis();
        Config::default().validate_combos(&catalog).unwrap();

        let mut cfg = Config::default();
        cfg.combos.push(vec!["Kitava Touched".into()]);
        let err = cfg.validate_combos(&catalog).unwrap_err();
        assert!(format!("{err:#}").contains("Kitava-Touched"));
    }
}
