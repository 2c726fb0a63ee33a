//! blockprobe
//!
//! 用长期持有的探测会话并发探测大量地址，把每个地址的三态结果持久化到结果文件。

pub mod cli;
pub mod config;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod sink;

pub use config::Config;
pub use error::{ProbeError, Result};
pub use pipeline::{Outcome, ProbePipeline, RunSummary, Tally};
