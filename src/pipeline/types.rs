//! 流水线相关的数据类型定义

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// 探测目标地址（不透明字符串，不做去重）
pub type Address = String;

/// 工作队列中的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// 待探测的地址
    Address(Address),
    /// 结束信号，每个工作线程恰好消费一个
    Sentinel,
}

/// 结果队列中的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultMessage {
    /// 单条探测结果
    Record(ResultRecord),
    /// 结束信号，由编排器在所有工作线程退出后发送
    Sentinel,
}

/// 探测失败原因
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum FailureReason {
    /// 连接超时
    Timeout,
    /// 域名解析失败
    NameResolution,
    /// 其他错误，保留原始错误信息
    Other(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::NameResolution => write!(f, "name_resolution"),
            FailureReason::Other(message) => write!(f, "other: {message}"),
        }
    }
}

/// 单次探测的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 探测成功，携带观测到的信号
    Detected(bool),
    /// 探测未能完成
    Failed(FailureReason),
}

impl Outcome {
    /// 是否观测到信号
    pub fn is_detected(&self) -> bool {
        matches!(self, Outcome::Detected(true))
    }

    /// 是否探测失败
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// 三态表示：`Some(true)` 检测到，`Some(false)` 可达但未检测到，`None` 失败
    pub fn as_tri_state(&self) -> Option<bool> {
        match self {
            Outcome::Detected(signal) => Some(*signal),
            Outcome::Failed(_) => None,
        }
    }

    /// 失败原因
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Failed(reason) => Some(reason),
            Outcome::Detected(_) => None,
        }
    }
}

/// 地址与探测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub address: Address,
    pub outcome: Outcome,
}

impl ResultRecord {
    pub fn new<A: Into<Address>>(address: A, outcome: Outcome) -> Self {
        Self { address: address.into(), outcome }
    }
}

/// 运行统计，仅由写入线程持有和修改
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// 已写入的记录数
    pub processed: u64,
    /// 检测到信号的记录数
    pub detected: u64,
    /// 探测失败的记录数
    pub errored: u64,
}

impl Tally {
    /// 计入一条结果
    pub fn record(&mut self, outcome: &Outcome) {
        self.processed += 1;
        if outcome.is_detected() {
            self.detected += 1;
        } else if outcome.is_failed() {
            self.errored += 1;
        }
    }

    /// 可达但未检测到信号的记录数
    pub fn reachable_undetected(&self) -> u64 {
        self.processed - self.detected - self.errored
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {}, Detected: {}, Errored: {}",
            self.processed, self.detected, self.errored
        )
    }
}

/// 加载线程的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// 入队的地址数
    pub enqueued: u64,
    /// 跳过的注释行数
    pub skipped_comments: u64,
}

/// 单个工作线程的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// 探测的地址数
    pub probed: u64,
    /// 其中探测失败的数量
    pub failed: u64,
}

/// 一次完整运行的总结
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// 写入线程的最终统计
    pub tally: Tally,
    /// 工作线程池运行耗时
    pub duration: Duration,
    /// 请求的工作线程数
    pub workers_requested: usize,
    /// 成功获取会话并正常退出的工作线程数
    pub workers_started: usize,
    /// 加载线程的统计
    pub loaded: LoadReport,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, 耗时: {:.2?}", self.tally, self.duration)
    }
}
