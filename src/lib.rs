pub mod config;
pub mod error;
pub mod db;
pub mod profile;
pub mod transform;
pub mod facts;
pub mod contacts;
pub mod audit;
pub mod resolve;
pub mod graph;
pub mod ingest;
pub mod pipeline;

pub use config::Config;
pub use error::{ProfileGraphError, Result};
pub use facts::{Fact, FactPattern, ObjectKind};
pub use graph::{BatchReport, EdgeType, GraphResult, InferredEdge};
pub use pipeline::{ImportOutcome, ProfileGraph};
pub use profile::ProfileRecord;
pub use resolve::{MatchRule, Resolution};
pub use transform::{EntityKey, TransformOptions};
