pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{NoopSender, SlackClient, SlackSender};
pub use config::{file::SlackcatConfig, CliConfig};
pub use crate::core::{snippet::SnippetEngine, stream::StreamEngine};
pub use utils::error::{Result, SlackcatError};
