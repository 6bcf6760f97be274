// Adapters layer: concrete `Deliver` implementations for the Slack Web API and no-op mode.

pub mod noop;
pub mod slack;

pub use noop::NoopSender;
pub use slack::{SlackClient, SlackSender};
