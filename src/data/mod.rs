/// Data layer: column detection, streaming, filtering, aggregation and export.
///
/// Architecture:
/// ```text
///  scan export .csv
///        │
///        ▼
///   ┌──────────┐
///   │  detect   │  sample first rows → address / CVE column indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  full pass through ProgressReader → (address, CVE)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  network include / exclude predicate
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  address → {CVE}
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  chunked eVR records → file or upload body
///   └──────────┘
/// ```

pub mod detect;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod progress;
