pub mod config;
pub mod label;
pub mod label_config;
pub mod resolver;

pub use label_config::{resolve_full_mapping, Dimension, LabelConfig, Slot, UnknownDimension};
pub use resolver::{external_allocation_name, AggregateBy};
