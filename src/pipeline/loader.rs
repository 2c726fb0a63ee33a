//! 数据集加载线程
//!
//! 流式读取分隔符文件，跳过注释行，把指定列作为地址入队，
//! 入队结束后发送与工作线程数相同的结束信号，然后等待工作队列排空。

use super::queue::JoinableQueue;
use super::types::{LoadReport, WorkItem};
use crate::error::{ProbeError, Result};
use std::path::PathBuf;

/// 数据集描述
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    /// 文件路径
    pub path: PathBuf,
    /// 地址所在列（从 0 开始）
    pub column: usize,
    /// 分隔符
    pub delimiter: u8,
    /// 注释行前缀，匹配第一个字段
    pub comment_prefix: String,
}

impl DatasetSpec {
    pub fn new<P: Into<PathBuf>>(path: P, column: usize) -> Self {
        Self {
            path: path.into(),
            column,
            delimiter: b',',
            comment_prefix: "#".to_string(),
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn comment_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.comment_prefix = prefix.into();
        self
    }
}

/// 把数据集中的地址入队，不发送结束信号
///
/// 打开或解析失败时立即返回错误，已经入队的地址仍留在队列中。
pub fn enqueue_addresses(
    spec: &DatasetSpec,
    queue: &JoinableQueue<WorkItem>,
) -> Result<LoadReport> {
    #[cfg(feature = "logging")]
    tracing::info!(
        "开始加载数据集: {}，地址列: {}",
        spec.path.display(),
        spec.column
    );

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(spec.delimiter)
        .from_path(&spec.path)
        .map_err(|e| {
            ProbeError::dataset_error(0, format!("无法打开 {}: {e}", spec.path.display()))
        })?;

    let mut report = LoadReport::default();
    let mut record = csv::StringRecord::new();

    loop {
        let has_record = reader.read_record(&mut record).map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            ProbeError::dataset_error(line, e.to_string())
        })?;
        if !has_record {
            break;
        }

        let line = record.position().map(|p| p.line()).unwrap_or(0);

        // 忽略注释行
        if record
            .get(0)
            .is_some_and(|first| first.starts_with(spec.comment_prefix.as_str()))
        {
            report.skipped_comments += 1;
            continue;
        }

        let address = record.get(spec.column).ok_or_else(|| {
            ProbeError::dataset_error(
                line,
                format!("缺少第 {} 列 (该行只有 {} 列)", spec.column, record.len()),
            )
        })?;

        #[cfg(feature = "logging")]
        tracing::trace!("入队地址 (行{}): {}", line, address);

        queue.enqueue(WorkItem::Address(address.to_string()))?;
        report.enqueued += 1;
    }

    #[cfg(feature = "logging")]
    tracing::info!(
        "数据集读取完成，入队 {} 个地址，跳过 {} 行注释",
        report.enqueued,
        report.skipped_comments
    );

    Ok(report)
}

/// 发送指定数量的结束信号
pub fn send_sentinels(queue: &JoinableQueue<WorkItem>, count: usize) -> Result<()> {
    for _ in 0..count {
        queue.enqueue(WorkItem::Sentinel)?;
    }
    Ok(())
}

/// 加载数据集，发送 `pool_size` 个结束信号，并等待所有条目被确认
///
/// 返回时所有地址和结束信号都已被工作线程确认。
pub fn load_dataset(
    spec: &DatasetSpec,
    queue: &JoinableQueue<WorkItem>,
    pool_size: usize,
) -> Result<LoadReport> {
    let report = enqueue_addresses(spec, queue)?;

    // 结束信号，每个工作线程一个
    send_sentinels(queue, pool_size)?;

    #[cfg(feature = "logging")]
    tracing::debug!("已发送 {} 个结束信号，等待工作队列排空", pool_size);

    queue.join_all()?;

    #[cfg(feature = "logging")]
    tracing::info!("工作队列已排空，加载线程退出");

    Ok(report)
}
