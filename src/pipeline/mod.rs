//! 探测流水线
//!
//! 加载线程 → 工作队列 → 探测工作线程池 → 结果队列 → 写入线程

pub mod loader;
pub mod orchestrator;
pub mod probe_workers;
pub mod queue;
pub mod result_writer;
pub mod types;

// 重新导出常用类型和函数
pub use loader::{DatasetSpec, enqueue_addresses, load_dataset, send_sentinels};
pub use orchestrator::{ProbePipeline, run_pipeline, write_summary};
pub use probe_workers::{PoolReport, probe_address, run_worker_pool};
pub use queue::{AckGuard, JoinableQueue, QueueStats};
pub use result_writer::write_results;
pub use types::{
    Address, FailureReason, LoadReport, Outcome, ResultMessage, ResultRecord, RunSummary, Tally,
    WorkItem, WorkerReport,
};
