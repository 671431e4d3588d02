//! Oscilloscope CSV extraction.
//!
//! Vendor exports carry a metadata preamble of unknown length before the
//! `TIME,CH1,...` header. [`data::loader`] finds that header and parses the
//! rest into a [`data::model::Table`]; [`chart`] turns a table plus a
//! [`chart::config::ChartConfig`] into a renderer-agnostic plan.

pub mod app;
pub mod chart;
pub mod color;
pub mod data;
pub mod state;
