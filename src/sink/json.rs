//! JSON Lines 结果输出

use super::{ResultSink, SinkStats};
use crate::error::Result;
use crate::pipeline::types::{FailureReason, ResultRecord};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// 单行 JSON 的结构
#[derive(Serialize)]
struct JsonRow<'a> {
    address: &'a str,
    /// `null` 表示探测失败
    detected: Option<bool>,
    failure: Option<&'a FailureReason>,
}

/// JSON Lines 结果文件
pub struct JsonLinesSink {
    writer: BufWriter<File>,
    stats: SinkStats,
}

impl JsonLinesSink {
    /// 创建新的 JSON Lines 结果文件（覆盖已有文件）
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self { writer: BufWriter::new(file), stats: SinkStats::new() })
    }
}

impl ResultSink for JsonLinesSink {
    fn name(&self) -> &str {
        "JSONL"
    }

    fn write_record(&mut self, record: &ResultRecord) -> Result<()> {
        let row = JsonRow {
            address: &record.address,
            detected: record.outcome.as_tri_state(),
            failure: record.outcome.failure(),
        };
        serde_json::to_writer(&mut self.writer, &row)?;
        self.writer.write_all(b"\n")?;
        self.stats.written_records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.stats.flushes += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.stats.finish();

        #[cfg(feature = "logging")]
        tracing::info!("JSONL 写入完成: {}", self.stats);

        Ok(())
    }

    fn get_stats(&self) -> SinkStats {
        self.stats.clone()
    }
}
