//! 探测工作线程池
//!
//! 每个工作线程独占一个探测会话，从工作队列取地址、探测、分类，
//! 把结果推到结果队列。遇到结束信号时确认并退出，不向下游转发。

use super::queue::{AckGuard, JoinableQueue};
use super::types::{FailureReason, Outcome, ResultMessage, ResultRecord, WorkItem, WorkerReport};
use crate::config::PromptPolicy;
use crate::error::{ProbeError, Result};
use crate::session::{ErrorClassifier, ProbeSession, SessionError, SessionFactory};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

/// 工作线程共享的只读上下文
pub struct WorkerContext<'a, F: SessionFactory, C: ErrorClassifier + ?Sized> {
    pub factory: &'a F,
    pub classifier: &'a C,
    pub prompt_policy: PromptPolicy,
    pub work: &'a JoinableQueue<WorkItem>,
    pub results: &'a JoinableQueue<ResultMessage>,
    /// 工作线程实际消费的结束信号数
    pub sentinels_consumed: &'a AtomicUsize,
    /// 探测过程中工作线程 panic 而丢失的地址数
    pub lost_in_flight: &'a AtomicU64,
}

/// 正在探测的地址；线程在持有期间 panic 时计为丢失
struct InFlight<'a> {
    lost: &'a AtomicU64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.lost.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 线程池运行结果
#[derive(Debug, Default)]
pub struct PoolReport {
    /// 正常退出的工作线程
    pub workers: Vec<WorkerReport>,
    /// 获取会话失败或 panic 的工作线程
    pub failures: Vec<ProbeError>,
    /// 没有产生结果的地址数：缺员时留在队列里的地址，加上探测中 panic 丢失的地址
    pub abandoned: u64,
    /// 工作线程消费的结束信号数
    pub sentinels_consumed: usize,
}

impl PoolReport {
    pub fn workers_started(&self) -> usize {
        self.workers.len()
    }

    /// 线程池是否缺员
    pub fn is_under_provisioned(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// 把会话错误转换为探测结果
fn outcome_from_error<C: ErrorClassifier + ?Sized>(
    error: SessionError,
    classifier: &C,
    prompt_policy: PromptPolicy,
) -> Outcome {
    match (error, prompt_policy) {
        // 出现提示说明页面已经加载，视为可达但没有信号
        (SessionError::UnexpectedPrompt(_), PromptPolicy::AssumeReachable) => {
            Outcome::Detected(false)
        }
        (SessionError::UnexpectedPrompt(message), PromptPolicy::TreatAsFailure) => {
            Outcome::Failed(FailureReason::Other(format!("unexpected prompt: {message}")))
        }
        (error @ SessionError::Driver(_), _) => {
            Outcome::Failed(classifier.classify(error.message()))
        }
    }
}

/// 探测单个地址
pub fn probe_address<S: ProbeSession, C: ErrorClassifier + ?Sized>(
    session: &mut S,
    classifier: &C,
    prompt_policy: PromptPolicy,
    address: &str,
) -> Outcome {
    let probed = session.visit(address).and_then(|()| session.signal());
    match probed {
        Ok(signal) => Outcome::Detected(signal),
        Err(error) => {
            #[cfg(feature = "logging")]
            tracing::debug!("探测 {} 失败: {}", address, error);
            outcome_from_error(error, classifier, prompt_policy)
        }
    }
}

/// 消费工作队列直到遇到结束信号
fn drain_work<S: ProbeSession, F: SessionFactory, C: ErrorClassifier + ?Sized>(
    worker_id: usize,
    session: &mut S,
    ctx: &WorkerContext<'_, F, C>,
) -> Result<WorkerReport> {
    let mut report = WorkerReport { worker_id, ..Default::default() };

    loop {
        let item = ctx.work.dequeue()?;
        // 无论探测结果如何都要确认，包括 panic
        let _ack = AckGuard::new(ctx.work);

        let address = match item {
            WorkItem::Sentinel => {
                ctx.sentinels_consumed.fetch_add(1, Ordering::SeqCst);
                #[cfg(feature = "logging")]
                tracing::debug!("工作线程 {} 收到结束信号", worker_id);
                break;
            }
            WorkItem::Address(address) => address,
        };

        #[cfg(feature = "logging")]
        tracing::trace!("工作线程 {} 探测: {}", worker_id, address);

        let _in_flight = InFlight { lost: ctx.lost_in_flight };
        let outcome = probe_address(session, ctx.classifier, ctx.prompt_policy, &address);

        #[cfg(feature = "logging")]
        {
            match &outcome {
                Outcome::Failed(FailureReason::Timeout) => {
                    tracing::info!("超时: {}", address)
                }
                Outcome::Failed(FailureReason::NameResolution) => {
                    tracing::info!("域名解析失败: {}", address)
                }
                Outcome::Failed(FailureReason::Other(message)) => {
                    tracing::warn!("探测出错: {}: {}", address, message)
                }
                Outcome::Detected(signal) => {
                    tracing::debug!("{} -> {}", address, signal)
                }
            }
        }

        report.probed += 1;
        if outcome.is_failed() {
            report.failed += 1;
        }
        ctx.results.enqueue(ResultMessage::Record(ResultRecord::new(address, outcome)))?;
    }

    Ok(report)
}

/// 单个探测工作线程
///
/// 获取会话失败时直接返回错误，此时该线程不会消费任何条目。
pub fn probe_worker<F: SessionFactory, C: ErrorClassifier + ?Sized>(
    worker_id: usize,
    ctx: &WorkerContext<'_, F, C>,
) -> Result<WorkerReport> {
    #[cfg(feature = "logging")]
    tracing::debug!("探测工作线程 {} 启动", worker_id);

    let mut session = ctx.factory.acquire(worker_id).map_err(|e| {
        ProbeError::SessionAcquire { worker_id, reason: e.to_string() }
    })?;

    let drained = drain_work(worker_id, &mut session, ctx);

    if let Err(_e) = session.release() {
        #[cfg(feature = "logging")]
        tracing::warn!("工作线程 {} 释放会话失败: {}", worker_id, _e);
    }

    #[cfg(feature = "logging")]
    {
        if let Ok(report) = &drained {
            tracing::info!(
                "探测工作线程 {} 退出，探测 {} 个地址，失败 {} 个",
                worker_id,
                report.probed,
                report.failed
            );
        }
    }

    drained
}

/// 回收缺员工作线程留下的结束信号
///
/// 所有地址都排在结束信号之前，因此只要还有一个工作线程存活，剩下的都是结束信号；
/// 全部工作线程失败时，地址也会留在队列里，这里确认并计为未探测。
fn reap_orphaned_sentinels(work: &JoinableQueue<WorkItem>, missing: usize) -> Result<u64> {
    let mut remaining = missing;
    let mut abandoned = 0u64;

    while remaining > 0 {
        let item = work.dequeue()?;
        let _ack = AckGuard::new(work);
        match item {
            WorkItem::Sentinel => remaining -= 1,
            WorkItem::Address(_address) => {
                abandoned += 1;
                #[cfg(feature = "logging")]
                tracing::warn!("没有可用的工作线程，地址未探测: {}", _address);
            }
        }
    }

    Ok(abandoned)
}

/// 运行 `pool_size` 个工作线程直到全部退出
///
/// 返回时工作队列中属于本线程池的结束信号已全部被确认。
pub fn run_worker_pool<F: SessionFactory, C: ErrorClassifier + ?Sized>(
    pool_size: usize,
    factory: &F,
    classifier: &C,
    prompt_policy: PromptPolicy,
    work: &JoinableQueue<WorkItem>,
    results: &JoinableQueue<ResultMessage>,
) -> Result<PoolReport> {
    #[cfg(feature = "logging")]
    tracing::info!("启动 {} 个探测工作线程", pool_size);

    let sentinels_consumed = AtomicUsize::new(0);
    let lost_in_flight = AtomicU64::new(0);
    let ctx = WorkerContext {
        factory,
        classifier,
        prompt_policy,
        work,
        results,
        sentinels_consumed: &sentinels_consumed,
        lost_in_flight: &lost_in_flight,
    };

    let mut report = PoolReport::default();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(pool_size);
        for worker_id in 0..pool_size {
            let ctx = &ctx;
            let spawned = thread::Builder::new()
                .name(format!("probe-worker-{worker_id}"))
                .spawn_scoped(scope, move || probe_worker(worker_id, ctx));
            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                // 线程没有启动，它的结束信号由下面的回收步骤处理
                Err(e) => report.failures.push(ProbeError::WorkerSpawn {
                    worker_id,
                    reason: e.to_string(),
                }),
            }
        }

        for (worker_id, handle) in handles {
            match handle.join() {
                Ok(Ok(worker)) => report.workers.push(worker),
                Ok(Err(e)) => {
                    #[cfg(feature = "logging")]
                    tracing::error!("探测工作线程 {} 失败: {}", worker_id, e);
                    report.failures.push(e);
                }
                Err(_panic) => {
                    #[cfg(feature = "logging")]
                    tracing::error!("探测工作线程 {} panic", worker_id);
                    report.failures.push(ProbeError::ThreadPanicked {
                        name: format!("probe-worker-{worker_id}"),
                    });
                }
            }
        }
    });

    report.sentinels_consumed = sentinels_consumed.load(Ordering::SeqCst);
    report.abandoned = lost_in_flight.load(Ordering::SeqCst);
    #[cfg(feature = "logging")]
    {
        if report.abandoned > 0 {
            tracing::warn!("{} 个地址在探测中因工作线程 panic 丢失", report.abandoned);
        }
    }

    let missing = pool_size.saturating_sub(report.sentinels_consumed);
    if missing > 0 {
        #[cfg(feature = "logging")]
        tracing::warn!("{} 个结束信号没有被工作线程消费，开始回收", missing);
        report.abandoned += reap_orphaned_sentinels(work, missing)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SubstringClassifier;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedSession(std::result::Result<bool, SessionError>);

    impl ProbeSession for FixedSession {
        fn visit(&mut self, _address: &str) -> std::result::Result<(), SessionError> {
            self.0.clone().map(|_| ())
        }

        fn signal(&mut self) -> std::result::Result<bool, SessionError> {
            self.0.clone()
        }

        fn release(self) -> std::result::Result<(), SessionError> {
            Ok(())
        }
    }

    fn probe(result: std::result::Result<bool, SessionError>, policy: PromptPolicy) -> Outcome {
        let classifier = SubstringClassifier::default();
        probe_address(&mut FixedSession(result), &classifier, policy, "https://example.test")
    }

    #[test]
    fn test_successful_probe_reports_signal() {
        assert_eq!(probe(Ok(true), PromptPolicy::AssumeReachable), Outcome::Detected(true));
        assert_eq!(probe(Ok(false), PromptPolicy::AssumeReachable), Outcome::Detected(false));
    }

    #[test]
    fn test_prompt_policy() {
        let prompt = || Err(SessionError::UnexpectedPrompt("alert: hi".into()));
        assert_eq!(probe(prompt(), PromptPolicy::AssumeReachable), Outcome::Detected(false));
        assert_eq!(
            probe(prompt(), PromptPolicy::TreatAsFailure),
            Outcome::Failed(FailureReason::Other("unexpected prompt: alert: hi".into()))
        );
    }

    #[test]
    fn test_driver_errors_are_classified() {
        let timeout = Err(SessionError::Driver("net::ERR_CONNECTION_TIMED_OUT".into()));
        assert_eq!(
            probe(timeout, PromptPolicy::AssumeReachable),
            Outcome::Failed(FailureReason::Timeout)
        );
    }

    /// 每次访问都先休眠的会话，`boom` 地址触发 panic
    struct SlowSession {
        delay: Duration,
        released: Arc<AtomicUsize>,
    }

    impl ProbeSession for SlowSession {
        fn visit(&mut self, address: &str) -> std::result::Result<(), SessionError> {
            thread::sleep(self.delay);
            if address == "boom" {
                panic!("browser crashed on {address}");
            }
            Ok(())
        }

        fn signal(&mut self) -> std::result::Result<bool, SessionError> {
            Ok(false)
        }

        fn release(self) -> std::result::Result<(), SessionError> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct SlowFactory {
        released: Arc<AtomicUsize>,
    }

    impl SessionFactory for SlowFactory {
        type Session = SlowSession;

        fn acquire(&self, _worker_id: usize) -> std::result::Result<SlowSession, SessionError> {
            Ok(SlowSession {
                delay: Duration::from_millis(5),
                released: Arc::clone(&self.released),
            })
        }
    }

    fn load(work: &JoinableQueue<WorkItem>, addresses: &[&str], pool_size: usize) {
        for address in addresses {
            work.enqueue(WorkItem::Address(address.to_string())).unwrap();
        }
        for _ in 0..pool_size {
            work.enqueue(WorkItem::Sentinel).unwrap();
        }
    }

    #[test]
    fn test_each_worker_consumes_exactly_one_sentinel() {
        let pool_size = 4;
        let addresses: Vec<String> = (0..20).map(|i| format!("h{i}.example")).collect();
        let addresses: Vec<&str> = addresses.iter().map(String::as_str).collect();

        let work = JoinableQueue::new();
        let results = JoinableQueue::new();
        load(&work, &addresses, pool_size);

        let factory = SlowFactory::default();
        let classifier = SubstringClassifier::default();
        let report = run_worker_pool(
            pool_size,
            &factory,
            &classifier,
            PromptPolicy::AssumeReachable,
            &work,
            &results,
        )
        .unwrap();

        assert_eq!(report.sentinels_consumed, pool_size);
        assert_eq!(report.workers_started(), pool_size);
        let mut ids: Vec<usize> = report.workers.iter().map(|w| w.worker_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(report.abandoned, 0);
        assert!(!report.is_under_provisioned());

        assert_eq!(report.workers.iter().map(|w| w.probed).sum::<u64>(), 20);
        assert_eq!(results.stats().enqueued(), 20);
        assert_eq!(work.outstanding(), 0);
        assert_eq!(factory.released.load(Ordering::SeqCst), pool_size);
    }

    #[test]
    fn test_panicked_address_is_counted_as_abandoned() {
        let work = JoinableQueue::new();
        let results = JoinableQueue::new();
        load(&work, &["a", "boom", "b", "c"], 2);

        let factory = SlowFactory::default();
        let classifier = SubstringClassifier::default();
        let report = run_worker_pool(
            2,
            &factory,
            &classifier,
            PromptPolicy::AssumeReachable,
            &work,
            &results,
        )
        .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], ProbeError::ThreadPanicked { .. }));
        // 丢失的地址加上 panic 线程没有消费的结束信号
        assert_eq!(report.sentinels_consumed, 1);
        assert_eq!(report.abandoned, 1);
        assert_eq!(results.stats().enqueued(), 3);
        assert_eq!(work.outstanding(), 0);
    }

    #[test]
    fn test_reap_counts_stranded_addresses() {
        let work = JoinableQueue::new();
        work.enqueue(WorkItem::Address("a".into())).unwrap();
        work.enqueue(WorkItem::Address("b".into())).unwrap();
        work.enqueue(WorkItem::Sentinel).unwrap();
        work.enqueue(WorkItem::Sentinel).unwrap();

        let abandoned = reap_orphaned_sentinels(&work, 2).unwrap();
        assert_eq!(abandoned, 2);
        assert_eq!(work.outstanding(), 0);
    }
}
