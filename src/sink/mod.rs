//! 结果输出模块
//!
//! 提供统一的结果写入接口和多种输出格式支持

pub mod csv;
pub mod json;
pub mod stats;

pub use self::csv::CsvResultSink;
pub use self::json::JsonLinesSink;
pub use stats::SinkStats;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::pipeline::types::ResultRecord;
use std::path::Path;

/// 结果写入的统一接口
///
/// 只有写入线程持有实现者，因此方法都取 `&mut self`。
pub trait ResultSink: Send {
    /// 输出名称
    fn name(&self) -> &str;

    /// 写入单条记录
    fn write_record(&mut self, record: &ResultRecord) -> Result<()>;

    /// 强制持久化已写入的记录
    fn flush(&mut self) -> Result<()>;

    /// 完成写入，清理资源
    fn finalize(&mut self) -> Result<()> {
        self.flush()
    }

    /// 获取写入统计信息
    fn get_stats(&self) -> SinkStats {
        SinkStats::default()
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write_record(&mut self, record: &ResultRecord) -> Result<()> {
        (**self).write_record(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn finalize(&mut self) -> Result<()> {
        (**self).finalize()
    }

    fn get_stats(&self) -> SinkStats {
        (**self).get_stats()
    }
}

/// 按输出格式创建结果文件
pub fn create_sink<P: AsRef<Path>>(
    path: P,
    format: OutputFormat,
) -> Result<Box<dyn ResultSink>> {
    Ok(match format {
        OutputFormat::Csv => Box::new(CsvResultSink::new(path)?),
        OutputFormat::Jsonl => Box::new(JsonLinesSink::new(path)?),
    })
}
