//! 配置管理模块
//!
//! 提供统一的配置文件读取和管理功能，命令行参数会覆盖文件中的值

use crate::error::{ProbeError, Result};
use crate::session::SubstringClassifier;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 工作线程数上限
pub const MAX_POOL_SIZE: usize = 256;

/// 默认强制刷盘间隔（记录数）
pub const DEFAULT_FLUSH_EVERY: u64 = 100;

/// 主配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 日志配置
    pub log: LogSection,
    /// 流水线配置
    pub pipeline: PipelineConfig,
    /// 探测会话配置
    pub session: SessionConfig,
    /// 错误分类配置
    pub classifier: ClassifierConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// 是否启用控制台输出
    pub enable_stdout: bool,
    /// 日志输出目录
    pub log_dir: String,
    /// 日志级别 (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            log_dir: "logs".to_string(),
            level: "info".to_string(),
        }
    }
}

/// 结果输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 分隔符文本，每行 `地址,三态结果`
    #[default]
    Csv,
    /// 每行一个 JSON 对象
    Jsonl,
}

/// 意外交互提示的处理策略
///
/// 出现提示时并没有读到页面信号。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PromptPolicy {
    /// 视为可达但未检测到信号
    #[default]
    AssumeReachable,
    /// 视为探测失败
    TreatAsFailure,
}

/// 流水线配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 数据集文件路径
    pub dataset: PathBuf,
    /// 结果输出路径
    pub output: PathBuf,
    /// 地址所在列（从 0 开始）
    pub column: usize,
    /// 工作线程数（每个线程一个探测会话）
    pub pool_size: usize,
    /// 每写入多少条记录强制刷盘一次
    pub flush_every: u64,
    /// 数据集分隔符
    pub delimiter: char,
    /// 注释行前缀（匹配第一个字段）
    pub comment_prefix: String,
    /// 结果输出格式
    pub output_format: OutputFormat,
    /// 意外交互提示的处理策略
    pub prompt_policy: PromptPolicy,
    /// 运行总结 JSON 输出路径
    pub summary_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("urls.csv"),
            output: PathBuf::from("results.csv"),
            column: 0,
            pool_size: std::thread::available_parallelism()
                .map(|n| n.get().min(MAX_POOL_SIZE))
                .unwrap_or(4),
            flush_every: DEFAULT_FLUSH_EVERY,
            delimiter: ',',
            comment_prefix: "#".to_string(),
            output_format: OutputFormat::default(),
            prompt_policy: PromptPolicy::default(),
            summary_path: None,
        }
    }
}

impl PipelineConfig {
    /// 分隔符字节，非 ASCII 分隔符返回配置错误
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                ProbeError::config_error(format!(
                    "分隔符必须是 ASCII 字符: {:?}",
                    self.delimiter
                ))
            })
    }

    /// 验证流水线配置
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(ProbeError::config_error(format!(
                "无效的工作线程数 {}: 必须在 1 到 {} 之间",
                self.pool_size, MAX_POOL_SIZE
            )));
        }

        if self.flush_every == 0 {
            return Err(ProbeError::config_error("刷盘间隔不能为0"));
        }

        self.delimiter_byte()?;

        if self.comment_prefix.is_empty() {
            return Err(ProbeError::config_error("注释前缀不能为空"));
        }

        Ok(())
    }
}

/// 探测会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebDriver 服务地址
    pub webdriver_url: String,
    /// 浏览器类型 (edge, chrome, firefox)
    pub browser: String,
    /// 浏览器用户数据目录
    pub user_data_dir: Option<String>,
    /// 是否无头运行
    pub headless: bool,
    /// 页面加载超时（秒）
    pub page_load_timeout_secs: u64,
    /// 访问后执行的信号脚本
    pub signal_script: String,
    /// 表示被限制的脚本返回值
    pub blocked_origin: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444/wd/hub".to_string(),
            browser: "edge".to_string(),
            user_data_dir: None,
            headless: false,
            page_load_timeout_secs: 30,
            signal_script: "return window.origin".to_string(),
            blocked_origin: "null".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }
}

/// 错误分类配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 超时错误标识
    pub timeout_markers: Vec<String>,
    /// 域名解析错误标识
    pub name_resolution_markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let classifier = SubstringClassifier::default();
        Self {
            timeout_markers: classifier.timeout_markers().to_vec(),
            name_resolution_markers: classifier.name_resolution_markers().to_vec(),
        }
    }
}

impl ClassifierConfig {
    /// 构建子串分类器
    pub fn build(&self) -> SubstringClassifier {
        SubstringClassifier::new(
            self.timeout_markers.iter().cloned(),
            self.name_resolution_markers.iter().cloned(),
        )
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// 从字符串加载配置
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| {
            ProbeError::config_error(format!("无法解析配置: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            ProbeError::config_error(format!("无法序列化配置: {e}"))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        match self.log.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ProbeError::config_error(format!(
                    "无效的日志级别: {}",
                    self.log.level
                )));
            }
        }

        self.pipeline.validate()?;

        if self.classifier.timeout_markers.iter().any(String::is_empty)
            || self.classifier.name_resolution_markers.iter().any(String::is_empty)
        {
            return Err(ProbeError::config_error("错误分类标识不能为空字符串"));
        }

        if self.session.webdriver_url.is_empty() {
            return Err(ProbeError::config_error("WebDriver 地址不能为空"));
        }

        Ok(())
    }
}
