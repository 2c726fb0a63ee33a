//! 探测会话接口
//!
//! 探测会话是外部能力：创建代价高、可复用、每个工作线程独占一个。
//! 流水线只依赖这里的 trait，具体驱动（WebDriver 或测试桩）可以替换。

pub mod classifier;
#[cfg(feature = "webdriver")]
pub mod webdriver;

pub use classifier::{ErrorClassifier, SubstringClassifier};
#[cfg(feature = "webdriver")]
pub use webdriver::{WebDriverFactory, WebDriverSession};

/// 会话操作错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// 页面弹出了意外的交互提示（例如 alert）
    #[error("意外的交互提示: {0}")]
    UnexpectedPrompt(String),

    /// 驱动返回的错误，消息原样交给分类器
    #[error("{0}")]
    Driver(String),
}

impl SessionError {
    /// 错误消息原文
    pub fn message(&self) -> &str {
        match self {
            SessionError::UnexpectedPrompt(message) => message,
            SessionError::Driver(message) => message,
        }
    }
}

/// 单个探测会话
pub trait ProbeSession {
    /// 访问地址
    fn visit(&mut self, address: &str) -> Result<(), SessionError>;

    /// 读取访问后的信号
    fn signal(&mut self) -> Result<bool, SessionError>;

    /// 释放会话
    fn release(self) -> Result<(), SessionError>
    where
        Self: Sized;
}

/// 探测会话工厂，在工作线程之间共享
pub trait SessionFactory: Sync {
    type Session: ProbeSession;

    /// 为指定工作线程获取一个会话
    fn acquire(&self, worker_id: usize) -> Result<Self::Session, SessionError>;
}
