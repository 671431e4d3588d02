use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::Layout;

// ---------------------------------------------------------------------------
// Chart configuration
// ---------------------------------------------------------------------------

/// Which of `count` equal slices of the capture to show.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segments {
    pub count: usize,
    pub selected: usize,
}

impl Default for Segments {
    fn default() -> Self {
        Self {
            count: 1,
            selected: 0,
        }
    }
}

/// Presentation options handed to the chart renderer, plus the file layout.
///
/// Every field has a default, so `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub layout: Layout,
    /// Channel display names: file name → shown name.
    pub channel_names: BTreeMap<String, String>,
    /// Channel drawn against the right-hand Y axis (after renaming).
    pub secondary_channel: Option<String>,
    /// Left Y axis range; defaults to the data range of its channels.
    pub y1_range: Option<[f64; 2]>,
    /// Right Y axis range; defaults to the data range of the secondary channel.
    pub y2_range: Option<[f64; 2]>,
    pub segments: Segments,
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            channel_names: BTreeMap::new(),
            secondary_channel: None,
            y1_range: None,
            y2_range: None,
            segments: Segments::default(),
            width: 800,
            height: 400,
            font_size: 18,
        }
    }
}

impl ChartConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing chart config")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading chart config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}
