//! `tracing` initialization shared by binaries embedding the tradenet
//! libraries.

mod logging;

pub use logging::{init, LogConfig, LogFormat, LogOutput};
