/// Data layer: core types, loading, and errors.
///
/// Architecture:
/// ```text
///  vendor .csv (Shift-JIS)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  decode → find header → parse rows → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  TIME + channel columns, rename / segment / range
///   └──────────┘
/// ```

pub mod error;
pub mod loader;
pub mod model;
