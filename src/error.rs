//! 错误类型定义
//!
//! 这个模块定义了库中使用的所有错误类型，使用 thiserror 提供丰富的错误信息。
//!
//! 流水线只把两类错误上抛为运行级失败：数据集无法读取/解析，以及探测会话无法获取
//! 导致的工作线程不足。单个地址的探测错误在工作线程内被转换为结果数据，不会出现在这里。
//!
//! 启用 `logging` feature 时，`*_error` 构造函数会在创建错误时写一条 error 日志。
//! 如果此前没有安装全局 subscriber，构造函数会先按默认配置初始化日志：
//! 安装全局 subscriber，并在当前工作目录下创建 `logs/`。
//! 作为库使用时应在构造任何错误之前调用 [`crate::logging::init_logging`]，
//! 或者关闭 `logging` feature。

use crate::pipeline::types::Tally;

/// 探测流水线的结果类型
pub type Result<T> = std::result::Result<T, ProbeError>;

/// 探测流水线错误类型
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// CSV 读写错误
    #[error("CSV错误: {0}")]
    Csv(#[from] csv::Error),

    /// JSON 序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 数据集错误 (行号从 1 开始)
    #[error("数据集错误 (行{line}): {reason}")]
    Dataset { line: u64, reason: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 队列错误
    #[error("队列错误: {0}")]
    Queue(String),

    /// 工作线程无法获取探测会话
    #[error("工作线程 {worker_id} 获取探测会话失败: {reason}")]
    SessionAcquire { worker_id: usize, reason: String },

    /// 工作线程无法创建
    #[error("工作线程 {worker_id} 创建失败: {reason}")]
    WorkerSpawn { worker_id: usize, reason: String },

    /// 线程 panic
    #[error("线程 {name} panic")]
    ThreadPanicked { name: String },

    /// 工作线程不足：部分工作线程未能启动或异常退出
    ///
    /// `abandoned` 是没有产生结果的地址数，包括工作线程 panic 时正在探测的地址。
    #[error(
        "工作线程不足: 请求 {requested} 个，失败 {failed} 个，未处理地址 {abandoned} 个"
    )]
    UnderProvisioned { requested: usize, failed: usize, abandoned: u64 },

    /// 结果输出错误
    #[error("结果输出错误: {0}")]
    Sink(String),

    /// 运行中止，附带写入线程已累计的统计
    #[error("运行中止: {cause} (已处理 {} 条)", .partial.processed)]
    Aborted { cause: Box<ProbeError>, partial: Tally },

    /// 日志错误（仅在启用 logging feature 时可用）
    #[cfg(feature = "logging")]
    #[error("日志错误: {0}")]
    Log(#[from] crate::logging::LogError),
}

impl ProbeError {
    /// 创建一个数据集错误
    ///
    /// 会记录 error 日志，日志未初始化时按默认配置初始化（创建 `./logs`），见模块文档。
    pub fn dataset_error<S: Into<String>>(line: u64, reason: S) -> Self {
        let reason = reason.into();
        #[cfg(feature = "logging")]
        {
            crate::logging::ensure_logger_initialized();
            tracing::error!("数据集错误发生在第{}行: {}", line, reason);
        }
        Self::Dataset { line, reason }
    }

    /// 创建一个配置错误
    ///
    /// 与 [`ProbeError::dataset_error`] 一样会记录日志并可能初始化默认日志。
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        #[cfg(feature = "logging")]
        {
            crate::logging::ensure_logger_initialized();
            tracing::error!("配置错误: {}", message);
        }
        Self::Config(message)
    }

    /// 创建一个队列错误
    ///
    /// 与 [`ProbeError::dataset_error`] 一样会记录日志并可能初始化默认日志。
    pub fn queue_error<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        #[cfg(feature = "logging")]
        {
            crate::logging::ensure_logger_initialized();
            tracing::error!("队列错误: {}", message);
        }
        Self::Queue(message)
    }

    /// 创建一个结果输出错误
    ///
    /// 与 [`ProbeError::dataset_error`] 一样会记录日志并可能初始化默认日志。
    pub fn sink_error<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        #[cfg(feature = "logging")]
        {
            crate::logging::ensure_logger_initialized();
            tracing::error!("结果输出错误: {}", message);
        }
        Self::Sink(message)
    }

    /// 包装为运行中止错误；已经是中止错误时保留原有的部分统计
    pub fn aborted(self, partial: Tally) -> Self {
        match self {
            aborted @ Self::Aborted { .. } => aborted,
            cause => Self::Aborted { cause: Box::new(cause), partial },
        }
    }

    /// 获取中止时的部分统计
    pub fn partial_tally(&self) -> Option<&Tally> {
        match self {
            Self::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// 获取根本原因（解开中止包装）
    pub fn root_cause(&self) -> &ProbeError {
        match self {
            Self::Aborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// 检查是否为数据集错误
    pub fn is_dataset_error(&self) -> bool {
        matches!(self.root_cause(), ProbeError::Dataset { .. })
    }

    /// 检查是否为工作线程不足
    pub fn is_under_provisioned(&self) -> bool {
        matches!(self.root_cause(), ProbeError::UnderProvisioned { .. })
    }

    /// 检查是否为配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, ProbeError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let dataset_err = ProbeError::dataset_error(3, "missing column");
        assert!(dataset_err.is_dataset_error());

        let config_err = ProbeError::config_error("pool size is zero");
        assert!(config_err.is_config_error());
        assert!(!config_err.is_dataset_error());
    }

    #[cfg(feature = "logging")]
    #[test]
    fn test_constructor_installs_default_logger() {
        let _err = ProbeError::queue_error("receiver dropped");
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let probe_err: ProbeError = io_err.into();
        assert!(matches!(probe_err, ProbeError::Io(_)));
    }

    #[test]
    fn test_aborted_keeps_first_partial() {
        let first = Tally { processed: 7, detected: 2, errored: 1 };
        let err = ProbeError::sink_error("disk full").aborted(first);
        let err = err.aborted(Tally::default());

        assert_eq!(err.partial_tally(), Some(&first));
        assert!(matches!(err.root_cause(), ProbeError::Sink(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ProbeError::UnderProvisioned {
            requested: 4,
            failed: 1,
            abandoned: 0,
        };
        let display = format!("{}", err);
        assert!(display.contains('4'));
        assert!(display.contains('1'));

        let aborted = err.aborted(Tally { processed: 42, ..Default::default() });
        assert!(aborted.to_string().contains("42"));
        assert!(aborted.is_under_provisioned());
    }
}
