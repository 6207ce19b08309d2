//! SvLens: structural-variant call ingestion and exploration.
//!
//! SvLens reads call files produced by multi-caller pipelines, keeps each
//! dialect's records in its own store partition, infers the type of every
//! field from the live records, and serves filtered, windowed queries and
//! chart aggregates to the views of a report.
//!
//! # Core Principles
//!
//! - **Dialect-aware**: aggregate-caller and per-caller-genotype files are
//!   told apart per record and never mixed in one partition
//! - **Non-destructive**: header lines are kept so any subset exports back
//!   to call-file text
//! - **Live metadata**: field types come from the stored records, not
//!   from header declarations
//!
//! # Example
//!
//! ```no_run
//! use svlens::{Dialect, Predicate, SvLens};
//!
//! # async fn run() -> svlens::Result<()> {
//! let lens = SvLens::new();
//! let bytes = std::fs::read("merged.vcf.gz")?;
//! let report = lens.ingest(Dialect::AggregateCaller, &bytes, None, None).await?;
//! println!("Stored: {}", report.records_stored);
//!
//! let fields = lens.field_metadata(Dialect::AggregateCaller).await;
//! println!("Fields: {}", fields.len());
//!
//! let deletions = Predicate::all().exact("SVTYPE", "DEL");
//! println!("{}", lens.export(Dialect::AggregateCaller, &deletions).await);
//! # Ok(())
//! # }
//! ```

pub mod charts;
pub mod dialect;
pub mod error;
pub mod events;
pub mod export;
pub mod inference;
pub mod input;
pub mod logging;
pub mod schema;
pub mod stats;
pub mod store;

mod svlens;

pub use crate::svlens::{IngestReport, SvLens, SvLensConfig};
pub use charts::ChartData;
pub use dialect::{Dialect, DialectHandler, HandlerRegistry};
pub use error::{Result, SvLensError};
pub use events::{EventBus, PublishOutcome, SectionState, Signal, SignalKind, Subscription};
pub use inference::{AnalyzerConfig, FieldAnalyzer};
pub use input::{FileHeader, ParserConfig, SourceMetadata, VariantRecord, VcfParser};
pub use logging::{LogConfig, init_logging};
pub use schema::{FieldMetadataMap, FieldSource, FieldStats, FieldType};
pub use store::{Criterion, Predicate, StoreConfig, VariantStore, VersionCheck, VersionTag, Window};
