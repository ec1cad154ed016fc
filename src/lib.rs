pub mod column_resolver;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fields;
pub mod record_filter;
pub mod render;
pub mod session;
pub mod value;

pub use column_resolver::{AliasTable, ColumnResolver, FieldMapping, ResolutionMode};
pub use config::CardConfig;
pub use dataset::{Dataset, LoadOptions, Record};
pub use error::{CardError, Result};
pub use fields::Field;
pub use record_filter::{filter_records, MatchSet, Query, RecordFilter, TrackAllowList};
pub use session::{CardBody, LookupOutcome, Session, TrainingCard, TrainingEntry};
pub use value::CellValue;
