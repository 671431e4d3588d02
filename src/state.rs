use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::chart::config::ChartConfig;
use crate::chart::plan::{build_plan, ChartPlan};
use crate::data::loader::load_file;
use crate::data::model::Table;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The loaded capture and its derived chart, independent of any front end.
///
/// Loading a new file replaces the previous table and plan; nothing is
/// carried over between captures except the configuration.
pub struct AppState {
    /// Parsed capture (None until a file is loaded).
    pub table: Option<Table>,

    /// File the current table came from.
    pub source: Option<PathBuf>,

    /// Presentation options and file layout.
    pub config: ChartConfig,

    /// Plan for the current table and config (cached).
    pub plan: Option<ChartPlan>,

    /// Last error, for display.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

impl AppState {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            table: None,
            source: None,
            config,
            plan: None,
            status_message: None,
        }
    }

    /// Load a capture using the configured layout.
    ///
    /// On failure the previous table is kept and the error is recorded in
    /// `status_message` as well as returned.
    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        match load_file(path, &self.config.layout) {
            Ok(table) => {
                log::info!(
                    "Loaded {} rows with columns {:?} from {}",
                    table.len(),
                    table.column_names(),
                    path.display()
                );
                self.source = Some(path.to_path_buf());
                self.set_table(table);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
                Err(e)
            }
        }
    }

    /// Ingest a newly parsed table and rebuild the plan.
    pub fn set_table(&mut self, table: Table) {
        self.table = Some(table);
        self.status_message = None;
        self.rebuild_plan();
    }

    /// Replace the configuration and rebuild the plan.
    pub fn set_config(&mut self, config: ChartConfig) {
        self.config = config;
        self.rebuild_plan();
    }

    /// Recompute `plan` after a table or config change.
    pub fn rebuild_plan(&mut self) {
        self.plan = None;
        let Some(table) = &self.table else {
            return;
        };
        match build_plan(table, &self.config) {
            Ok(plan) => self.plan = Some(plan),
            Err(e) => {
                log::error!("Cannot build chart: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}
