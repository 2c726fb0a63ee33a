//! CSV 结果输出
//!
//! 每行两列：地址和三态结果。`true` 检测到信号，`false` 可达但未检测到，
//! 空字段表示探测失败。不写表头。

use super::{ResultSink, SinkStats};
use crate::error::Result;
use crate::pipeline::types::ResultRecord;
use std::fs::File;
use std::path::Path;

/// CSV 结果文件
pub struct CsvResultSink {
    writer: csv::Writer<File>,
    stats: SinkStats,
}

impl CsvResultSink {
    /// 创建新的 CSV 结果文件（覆盖已有文件）
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_delimiter(path, b',')
    }

    /// 使用指定分隔符创建
    pub fn with_delimiter<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let file = File::create(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .from_writer(file);

        Ok(Self { writer, stats: SinkStats::new() })
    }

    /// 三态结果的文本形式
    fn tri_state_field(record: &ResultRecord) -> &'static str {
        match record.outcome.as_tri_state() {
            Some(true) => "true",
            Some(false) => "false",
            None => "",
        }
    }
}

impl ResultSink for CsvResultSink {
    fn name(&self) -> &str {
        "CSV"
    }

    fn write_record(&mut self, record: &ResultRecord) -> Result<()> {
        self.writer
            .write_record([record.address.as_str(), Self::tri_state_field(record)])?;
        self.stats.written_records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.stats.flushes += 1;

        #[cfg(feature = "logging")]
        tracing::debug!("CSV 已刷盘: {} 条记录", self.stats.written_records);

        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.stats.finish();

        #[cfg(feature = "logging")]
        tracing::info!("CSV 写入完成: {}", self.stats);

        Ok(())
    }

    fn get_stats(&self) -> SinkStats {
        self.stats.clone()
    }
}
