// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Rgb;

/// Tunable engine settings. Every field has a default, so a config file only
/// needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Watermark catalog additions and QR heuristic constants.
    pub catalog: CatalogConfig,
    /// Wall-clock budget for one job, in seconds.
    pub job_timeout_secs: u64,
    /// Worker threads for per-page work (0 = one per CPU).
    pub worker_threads: usize,
    /// Fill used when no background colour can be sampled.
    pub fallback_fill: Rgb,
    /// Width in pixels of the ring sampled around a covered raster region.
    pub sample_ring_px: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            job_timeout_secs: 120,
            worker_threads: 0,
            fallback_fill: Rgb::WHITE,
            sample_ring_px: 4,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Write this config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Catalog extensions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Extra watermark strings on top of the built-in variants.
    pub extra_text_variants: Vec<TextVariant>,
    pub qrcode: QrHeuristicConfig,
}

/// A watermark string and the script it is written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextVariant {
    pub text: String,
    /// BCP-47-ish tag: "zh" matches exactly, anything else case-insensitively.
    pub language: String,
}

/// Geometry of the QR stamp, all relative to the displayed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrHeuristicConfig {
    /// Left edge of the target region as a fraction of page width.
    pub region_left: f32,
    /// Top edge of the target region as a fraction of page height,
    /// measured from the top of the page.
    pub region_top: f32,
    pub min_area_fraction: f32,
    pub max_area_fraction: f32,
    pub max_height_fraction: f32,
    /// Allowed deviation of width/height from 1.0.
    pub aspect_tolerance: f32,
}

impl Default for QrHeuristicConfig {
    fn default() -> Self {
        Self {
            region_left: 0.65,
            region_top: 0.70,
            min_area_fraction: 0.0005,
            max_area_fraction: 0.05,
            max_height_fraction: 0.12,
            aspect_tolerance: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "job_timeout_secs": 5, "catalog": { "qrcode": { "region_left": 0.5 } } }"#)
                .unwrap();
        assert_eq!(config.job_timeout_secs, 5);
        assert_eq!(config.catalog.qrcode.region_left, 0.5);
        assert_eq!(config.catalog.qrcode.region_top, 0.70);
        assert_eq!(config.fallback_fill, Rgb::WHITE);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unmark.json");

        let mut config = EngineConfig::default();
        config.worker_threads = 2;
        config.catalog.extra_text_variants.push(TextVariant {
            text: "Scanned by Example".into(),
            language: "en".into(),
        });
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::load("/nonexistent/unmark.json").unwrap_err();
        assert!(matches!(err, crate::UnmarkError::Io(_)));
    }
}
