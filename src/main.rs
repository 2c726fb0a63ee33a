use anyhow::{Context, Result};
use blockprobe::cli::Cli;
use blockprobe::pipeline::ProbePipeline;
use blockprobe::session::WebDriverFactory;
use blockprobe::sink::create_sink;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config().context("加载配置失败")?;

    #[cfg(feature = "logging")]
    {
        use blockprobe::logging::{LogConfig, init_logging};
        init_logging(LogConfig::from_section(&config.log)?)?;
    }

    let sink = create_sink(&config.pipeline.output, config.pipeline.output_format)
        .with_context(|| format!("无法创建结果文件: {}", config.pipeline.output.display()))?;

    let factory = WebDriverFactory::new(config.session.clone());
    let pipeline = ProbePipeline::new(config.pipeline.clone(), factory)
        .with_classifier(config.classifier.build());

    match pipeline.run(sink) {
        Ok(summary) => {
            println!("{}", summary.tally);
            println!("Completed in {:.2} seconds", summary.duration.as_secs_f64());
            Ok(())
        }
        Err(e) => {
            if let Some(partial) = e.partial_tally() {
                println!("{partial}");
            }
            eprintln!("运行失败: {e}");
            std::process::exit(1);
        }
    }
}
