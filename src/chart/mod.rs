/// Chart layer: presentation options and the plan handed to a renderer.
///
/// Nothing here draws. A `ChartPlan` is plain data, serialised as JSON for
/// whichever charting front end consumes it.

pub mod config;
pub mod plan;
