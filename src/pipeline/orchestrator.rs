//! 流水线编排
//!
//! 加载线程和写入线程与工作线程池并行运行。工作线程池全部退出后才向结果队列
//! 发送唯一的结束信号，因此结束信号一定是写入线程收到的最后一条消息。

use super::loader::{DatasetSpec, enqueue_addresses, send_sentinels};
use super::probe_workers::run_worker_pool;
use super::queue::JoinableQueue;
use super::result_writer::write_results;
use super::types::{LoadReport, ResultMessage, RunSummary, Tally, WorkItem};
use crate::config::PipelineConfig;
use crate::error::{ProbeError, Result};
use crate::session::{ErrorClassifier, SessionFactory, SubstringClassifier};
use crate::sink::ResultSink;
use chrono::Local;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

/// 探测流水线
pub struct ProbePipeline<F: SessionFactory, C: ErrorClassifier = SubstringClassifier> {
    config: PipelineConfig,
    factory: F,
    classifier: C,
}

impl<F: SessionFactory> ProbePipeline<F> {
    /// 使用默认错误分类器创建流水线
    pub fn new(config: PipelineConfig, factory: F) -> Self {
        Self { config, factory, classifier: SubstringClassifier::default() }
    }
}

impl<F: SessionFactory, C: ErrorClassifier> ProbePipeline<F, C> {
    /// 替换错误分类器
    pub fn with_classifier<C2: ErrorClassifier>(self, classifier: C2) -> ProbePipeline<F, C2> {
        ProbePipeline { config: self.config, factory: self.factory, classifier }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn dataset_spec(&self) -> Result<DatasetSpec> {
        Ok(DatasetSpec::new(self.config.dataset.clone(), self.config.column)
            .delimiter(self.config.delimiter_byte()?)
            .comment_prefix(self.config.comment_prefix.as_str()))
    }

    /// 运行整个流水线直到所有结果写入 `sink`
    ///
    /// 数据集错误、工作线程不足和输出错误都会以
    /// [`ProbeError::Aborted`] 返回，其中带有写入线程已累计的统计。
    pub fn run<S: ResultSink>(&self, sink: S) -> Result<RunSummary> {
        self.config.validate()?;

        let pool_size = self.config.pool_size;
        let dataset = self.dataset_spec()?;
        let flush_every = self.config.flush_every;
        let work = JoinableQueue::<WorkItem>::new();
        let results = JoinableQueue::<ResultMessage>::new();

        #[cfg(feature = "logging")]
        tracing::info!(
            "开始探测: 数据集 {}，地址列 {}，{} 个工作线程",
            dataset.path.display(),
            dataset.column,
            pool_size
        );

        let started_at = Local::now();

        let (loaded, written, pool, duration) = thread::scope(|scope| -> Result<_> {
            let (work, results, dataset) = (&work, &results, &dataset);

            let writer = thread::Builder::new()
                .name("result-writer".to_string())
                .spawn_scoped(scope, move || write_results(sink, results, flush_every))?;

            let loader = match thread::Builder::new()
                .name("loader".to_string())
                .spawn_scoped(scope, move || run_loader(dataset, work, pool_size))
            {
                Ok(handle) => handle,
                Err(e) => {
                    // 写入线程已经在等待，先让它退出
                    results.enqueue(ResultMessage::Sentinel)?;
                    return Err(e.into());
                }
            };

            let pool_start = Instant::now();
            let pool = run_worker_pool(
                pool_size,
                &self.factory,
                &self.classifier,
                self.config.prompt_policy,
                work,
                results,
            );
            let duration = pool_start.elapsed();

            // 所有工作线程都已退出，结果队列的结束信号一定排在最后
            results.enqueue(ResultMessage::Sentinel)?;

            let written = join_thread(writer, "result-writer");
            let loaded = join_thread(loader, "loader");
            Ok((loaded, written, pool, duration))
        })?;

        let tally = match written {
            Ok(tally) => tally,
            Err(e) => {
                let partial = e.partial_tally().copied().unwrap_or_default();
                // 加载线程的错误优先
                return Err(match loaded {
                    Err(load_err) => load_err.aborted(partial),
                    Ok(_) => e.aborted(partial),
                });
            }
        };

        let loaded = loaded.map_err(|e| e.aborted(tally))?;
        let pool = pool.map_err(|e| e.aborted(tally))?;

        if pool.is_under_provisioned() {
            return Err(ProbeError::UnderProvisioned {
                requested: pool_size,
                failed: pool.failures.len(),
                abandoned: pool.abandoned,
            }
            .aborted(tally));
        }

        let summary = RunSummary {
            tally,
            duration,
            workers_requested: pool_size,
            workers_started: pool.workers_started(),
            loaded,
            started_at,
            finished_at: Local::now(),
        };

        #[cfg(feature = "logging")]
        tracing::info!("探测完成: {}", summary);

        if let Some(path) = &self.config.summary_path {
            write_summary(&summary, path).map_err(|e| e.aborted(tally))?;
        }

        Ok(summary)
    }
}

/// 加载线程主体
///
/// 加载失败时仍然发送 `pool_size` 个结束信号，
/// 工作线程处理完已入队的地址后退出。
fn run_loader(
    dataset: &DatasetSpec,
    work: &JoinableQueue<WorkItem>,
    pool_size: usize,
) -> Result<LoadReport> {
    let loaded = enqueue_addresses(dataset, work);

    if let Err(_e) = &loaded {
        #[cfg(feature = "logging")]
        tracing::error!("数据集加载失败，通知工作线程退出: {}", _e);
    }

    send_sentinels(work, pool_size)?;

    let report = loaded?;
    work.join_all()?;

    #[cfg(feature = "logging")]
    tracing::info!("工作队列已排空，加载线程退出");

    Ok(report)
}

fn join_thread<T>(handle: ScopedJoinHandle<'_, Result<T>>, name: &str) -> Result<T> {
    handle.join().unwrap_or_else(|_| {
        #[cfg(feature = "logging")]
        tracing::error!("线程 {} panic", name);
        Err(ProbeError::ThreadPanicked { name: name.to_string() })
    })
}

/// 把运行总结写为 JSON
pub fn write_summary<P: AsRef<Path>>(summary: &RunSummary, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;

    #[cfg(feature = "logging")]
    tracing::debug!("运行总结已写入: {}", path.as_ref().display());

    Ok(())
}

/// 只关心统计时的便捷入口
pub fn run_pipeline<F: SessionFactory, S: ResultSink>(
    config: PipelineConfig,
    factory: F,
    sink: S,
) -> Result<Tally> {
    ProbePipeline::new(config, factory).run(sink).map(|summary| summary.tally)
}
