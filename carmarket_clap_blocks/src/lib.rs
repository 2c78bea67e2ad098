//! Building blocks for the [`clap`]-based command line configuration.

pub mod http;
pub mod warehouse;
