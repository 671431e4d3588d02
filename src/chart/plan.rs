use serde::Serialize;
use thiserror::Error;

use crate::chart::config::{ChartConfig, Segments};
use crate::color::generate_palette;
use crate::data::error::ExtractError;
use crate::data::model::Table;

// ---------------------------------------------------------------------------
// Plan types – what a chart renderer needs, nothing it draws
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YAxis {
    Primary,
    Secondary,
}

/// One plotted line: a channel against the time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub axis: YAxis,
    pub color: String,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisPlan {
    pub title: String,
    /// Displayed range; `None` lets the renderer autoscale.
    pub range: Option<[f64; 2]>,
    /// Outer bounds for an interactive range control.
    pub limits: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPlan {
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
    pub segment: Segments,
    /// Rows in the selected segment.
    pub rows: usize,
    pub x_axis: AxisPlan,
    pub y1_axis: AxisPlan,
    pub y2_axis: Option<AxisPlan>,
    pub series: Vec<Series>,
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("invalid {axis} range [{min}, {max}]")]
    InvalidRange { axis: &'static str, min: f64, max: f64 },

    #[error("segment {selected} of {count} does not exist")]
    Segment { selected: usize, count: usize },

    #[error(transparent)]
    Table(#[from] ExtractError),
}

// ---------------------------------------------------------------------------
// Plan builder
// ---------------------------------------------------------------------------

/// Map a table and its presentation options to a chart plan.
///
/// Renaming and axis ranges are resolved against the whole capture, so the
/// Y axes stay put while switching between segments.
pub fn build_plan(table: &Table, config: &ChartConfig) -> Result<ChartPlan, ChartError> {
    let table = renamed(table, config)?;

    let secondary = config.secondary_channel.as_deref();
    if let Some(name) = secondary {
        if !table.channels().iter().any(|c| c.name == name) {
            return Err(ChartError::UnknownChannel(name.to_string()));
        }
    }

    let primary: Vec<&str> = table
        .channels()
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| Some(*name) != secondary)
        .collect();

    let y1_axis = axis_plan(
        "y1",
        primary.join(", "),
        table.value_range(primary.iter().copied()),
        config.y1_range,
    )?;
    let y2_axis = secondary
        .map(|name| axis_plan("y2", name.to_string(), table.value_range([name]), config.y2_range))
        .transpose()?;

    let view = select_segment(&table, config.segments)?;

    let time: &[f64] = view.time().map_or(&[][..], |c| c.values.as_slice());
    let colors = generate_palette(view.channels().len());
    let series: Vec<Series> = view
        .channels()
        .iter()
        .zip(colors)
        .map(|(col, color)| Series {
            name: col.name.clone(),
            axis: if Some(col.name.as_str()) == secondary {
                YAxis::Secondary
            } else {
                YAxis::Primary
            },
            color,
            points: time
                .iter()
                .zip(&col.values)
                .map(|(&t, &v)| [t, v])
                .collect(),
        })
        .collect();

    if series.is_empty() {
        log::warn!("Table has no channel columns; the chart will be empty");
    }

    Ok(ChartPlan {
        width: config.width,
        height: config.height,
        font_size: config.font_size,
        segment: config.segments,
        rows: view.len(),
        x_axis: AxisPlan {
            title: view.time().map(|c| c.name.clone()).unwrap_or_default(),
            range: None,
            limits: None,
        },
        y1_axis,
        y2_axis,
        series,
    })
}

/// The renamed rows of the configured segment, as the chart would show them.
pub fn view_table(table: &Table, config: &ChartConfig) -> Result<Table, ChartError> {
    select_segment(&renamed(table, config)?, config.segments)
}

fn renamed(table: &Table, config: &ChartConfig) -> Result<Table, ChartError> {
    let mut table = table.clone();
    table.rename_columns(&config.channel_names)?;
    Ok(table)
}

fn select_segment(table: &Table, segments: Segments) -> Result<Table, ChartError> {
    let Segments { count, selected } = segments;
    table
        .segment(selected, count)
        .ok_or(ChartError::Segment { selected, count })
}

/// `limits` spans half the data range below the minimum up to 1.5× the
/// maximum, never narrower than the data itself.
fn axis_plan(
    axis: &'static str,
    title: String,
    data: Option<(f64, f64)>,
    requested: Option<[f64; 2]>,
) -> Result<AxisPlan, ChartError> {
    if let Some([min, max]) = requested {
        if !(min <= max) {
            return Err(ChartError::InvalidRange { axis, min, max });
        }
    }
    let limits = data.map(|(lo, hi)| [lo - 0.5 * (hi - lo), (1.5 * hi).max(hi)]);
    Ok(AxisPlan {
        title,
        range: requested.or(data.map(|(lo, hi)| [lo, hi])),
        limits,
    })
}
