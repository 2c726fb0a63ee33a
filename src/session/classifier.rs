//! 驱动错误消息分类
//!
//! 驱动只给出错误文本，超时和域名解析失败靠子串匹配识别。
//! 这个字符串约定依赖具体驱动，所以放在 trait 后面。

use crate::pipeline::types::FailureReason;

/// 把驱动错误消息映射为失败原因
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, message: &str) -> FailureReason;
}

/// Chromium 网络栈的超时错误标识
pub const DEFAULT_TIMEOUT_MARKERS: &[&str] = &["CONNECTION_TIMED_OUT"];

/// Chromium 网络栈的域名解析错误标识
pub const DEFAULT_NAME_RESOLUTION_MARKERS: &[&str] = &["NAME_NOT_RESOLVED"];

/// 基于子串匹配的分类器，超时标识优先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstringClassifier {
    timeout_markers: Vec<String>,
    name_resolution_markers: Vec<String>,
}

impl SubstringClassifier {
    pub fn new<I, J, S, T>(timeout_markers: I, name_resolution_markers: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            timeout_markers: timeout_markers.into_iter().map(Into::into).collect(),
            name_resolution_markers: name_resolution_markers
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }

    pub fn timeout_markers(&self) -> &[String] {
        &self.timeout_markers
    }

    pub fn name_resolution_markers(&self) -> &[String] {
        &self.name_resolution_markers
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_TIMEOUT_MARKERS.iter().copied(),
            DEFAULT_NAME_RESOLUTION_MARKERS.iter().copied(),
        )
    }
}

impl ErrorClassifier for SubstringClassifier {
    fn classify(&self, message: &str) -> FailureReason {
        let matches = |markers: &[String]| {
            markers.iter().any(|marker| message.contains(marker.as_str()))
        };

        if matches(&self.timeout_markers) {
            FailureReason::Timeout
        } else if matches(&self.name_resolution_markers) {
            FailureReason::NameResolution
        } else {
            FailureReason::Other(message.to_string())
        }
    }
}
