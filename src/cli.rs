//! 命令行参数
//!
//! 位置参数与配置文件中的 `[pipeline]` 字段对应，命令行给出的值覆盖配置文件。

use crate::config::{Config, OutputFormat, PromptPolicy};
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "blockprobe",
    version,
    about = "并发探测地址列表，记录每个地址是否被拦截"
)]
pub struct Cli {
    /// 数据集文件（分隔符文本，无表头）
    pub dataset: Option<PathBuf>,

    /// 结果输出文件
    pub output: Option<PathBuf>,

    /// 地址所在列（从 0 开始）
    pub column: Option<usize>,

    /// 并发探测会话数
    pub concurrency: Option<usize>,

    /// TOML 配置文件
    #[arg(short, long, env = "BLOCKPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// 结果输出格式
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// 每写入多少条记录强制刷盘一次
    #[arg(long)]
    pub flush_every: Option<u64>,

    /// 数据集分隔符
    #[arg(long)]
    pub delimiter: Option<char>,

    /// WebDriver 服务地址
    #[arg(long, env = "BLOCKPROBE_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,

    /// 浏览器名称 (edge, chrome, firefox)
    #[arg(long)]
    pub browser: Option<String>,

    /// 浏览器用户数据目录
    #[arg(long)]
    pub user_data_dir: Option<String>,

    /// 无界面运行浏览器
    #[arg(long)]
    pub headless: bool,

    /// 意外交互提示的处理策略
    #[arg(long, value_enum)]
    pub prompt_policy: Option<PromptPolicy>,

    /// 运行总结 JSON 输出路径
    #[arg(long)]
    pub summary_json: Option<PathBuf>,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// 把命令行参数合并到配置中
    pub fn apply_to(&self, config: &mut Config) {
        let pipeline = &mut config.pipeline;
        if let Some(dataset) = &self.dataset {
            pipeline.dataset = dataset.clone();
        }
        if let Some(output) = &self.output {
            pipeline.output = output.clone();
        }
        if let Some(column) = self.column {
            pipeline.column = column;
        }
        if let Some(concurrency) = self.concurrency {
            pipeline.pool_size = concurrency;
        }
        if let Some(format) = self.format {
            pipeline.output_format = format;
        }
        if let Some(flush_every) = self.flush_every {
            pipeline.flush_every = flush_every;
        }
        if let Some(delimiter) = self.delimiter {
            pipeline.delimiter = delimiter;
        }
        if let Some(policy) = self.prompt_policy {
            pipeline.prompt_policy = policy;
        }
        if let Some(path) = &self.summary_json {
            pipeline.summary_path = Some(path.clone());
        }

        let session = &mut config.session;
        if let Some(url) = &self.webdriver_url {
            session.webdriver_url = url.clone();
        }
        if let Some(browser) = &self.browser {
            session.browser = browser.clone();
        }
        if let Some(dir) = &self.user_data_dir {
            session.user_data_dir = Some(dir.clone());
        }
        if self.headless {
            session.headless = true;
        }

        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
    }

    /// 读取配置文件（如果有），应用命令行覆盖并校验
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        self.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["blockprobe", "urls.csv", "out.csv", "1", "8"]).unwrap();
        let config = cli.load_config().unwrap();

        assert_eq!(config.pipeline.dataset, PathBuf::from("urls.csv"));
        assert_eq!(config.pipeline.output, PathBuf::from("out.csv"));
        assert_eq!(config.pipeline.column, 1);
        assert_eq!(config.pipeline.pool_size, 8);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[pipeline]\npool_size = 2\noutput_format = \"csv\"\n\n[session]\nbrowser = \"chrome\""
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "blockprobe",
            "--config",
            file.path().to_str().unwrap(),
            "--format",
            "jsonl",
            "--prompt-policy",
            "treat-as-failure",
            "--headless",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert_eq!(config.pipeline.pool_size, 2);
        assert_eq!(config.pipeline.output_format, OutputFormat::Jsonl);
        assert_eq!(config.pipeline.prompt_policy, PromptPolicy::TreatAsFailure);
        assert_eq!(config.session.browser, "chrome");
        assert!(config.session.headless);
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let cli = Cli::try_parse_from(["blockprobe", "urls.csv", "out.csv", "0", "0"]).unwrap();
        let err = cli.load_config().unwrap_err();
        assert!(err.is_config_error());
    }
}
