/// Data layer: core types, loading, cleaning and filtering.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Table (typed, nullable columns)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  quality  │  missing counts, fill / drop nulls (in place)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply value / range predicates → row indices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod quality;
