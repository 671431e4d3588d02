use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::chart::config::ChartConfig;
use crate::chart::plan::view_table;
use crate::data::loader::write_csv;
use crate::state::AppState;

pub const USAGE: &str = "usage: rusty-scope <capture.csv> [chart.json] [out.json|out.csv]";

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Positional arguments: capture, optional chart config, optional output.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub capture: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Args {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(capture) = args.next() else {
            bail!("{USAGE}");
        };
        let config = args.next().map(PathBuf::from);
        let output = args.next().map(PathBuf::from);
        if args.next().is_some() {
            bail!("too many arguments\n{USAGE}");
        }
        Ok(Self {
            capture: PathBuf::from(capture),
            config,
            output,
        })
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct RustyScopeApp {
    pub state: AppState,
}

impl Default for RustyScopeApp {
    fn default() -> Self {
        Self {
            state: AppState::default(),
        }
    }
}

impl RustyScopeApp {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Build from parsed arguments, loading the chart config if one is given.
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = match &args.config {
            Some(path) => ChartConfig::from_path(path)?,
            None => ChartConfig::default(),
        };
        Ok(Self::new(config))
    }

    /// Load the capture and write the result.
    ///
    /// A `.csv` output receives the renamed rows of the selected segment;
    /// anything else (or stdout) receives the chart plan as JSON.
    pub fn run(&mut self, args: &Args) -> Result<()> {
        self.state.load_path(&args.capture)?;
        let rendered = self.render(args.output.as_deref())?;
        match &args.output {
            Some(path) => {
                std::fs::write(path, rendered)
                    .with_context(|| format!("writing {}", path.display()))?;
                log::info!("Wrote {}", path.display());
            }
            None => println!("{rendered}"),
        }
        Ok(())
    }

    fn render(&self, output: Option<&Path>) -> Result<String> {
        let table = self.state.table.as_ref().context("no capture loaded")?;
        let wants_csv = output
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

        if wants_csv {
            let view = view_table(table, &self.state.config)?;
            return Ok(write_csv(&view)?);
        }

        match &self.state.plan {
            Some(plan) => serde_json::to_string_pretty(plan).context("serializing chart plan"),
            None => bail!(
                "{}",
                self.state
                    .status_message
                    .as_deref()
                    .unwrap_or("chart plan unavailable")
            ),
        }
    }
}
