pub mod aggregate;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod labels;
pub mod layout;
pub mod schema;

pub use aggregate::{Aggregator, Summary};
pub use labels::LabelTable;
pub use schema::Report;
