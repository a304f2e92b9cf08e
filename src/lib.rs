//! Community tracking and crossing-minimized flow layout over time-sliced graphs

pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod storage;
pub mod viz;

pub use anyhow::{anyhow, Result};
pub use config::Config;
pub use pipeline::{build_flow_diagram, build_flow_diagram_with, FlowDiagram, LayoutReport};
