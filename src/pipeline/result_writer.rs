//! 结果写入线程
//!
//! 结果队列的唯一消费者。逐条持久化、累计统计，每 `flush_every` 条强制刷盘，
//! 收到结束信号后完成写入并返回最终统计。

use super::queue::JoinableQueue;
use super::types::{ResultMessage, Tally};
use crate::error::Result;
use crate::sink::ResultSink;

fn drain_results<S: ResultSink>(
    sink: &mut S,
    queue: &JoinableQueue<ResultMessage>,
    flush_every: u64,
    tally: &mut Tally,
) -> Result<()> {
    loop {
        let record = match queue.dequeue()? {
            ResultMessage::Sentinel => {
                queue.acknowledge()?;
                #[cfg(feature = "logging")]
                tracing::debug!("写入线程收到结束信号");
                return Ok(());
            }
            ResultMessage::Record(record) => record,
        };

        let written = sink.write_record(&record);
        if written.is_ok() {
            tally.record(&record.outcome);
        }
        // 写入失败时同样确认
        queue.acknowledge()?;
        written?;

        if tally.processed % flush_every == 0 {
            sink.flush()?;
            #[cfg(feature = "logging")]
            tracing::debug!("已强制刷盘，累计 {} 条", tally.processed);
        }
    }
}

/// 消费结果队列直到结束信号，返回最终统计
///
/// 输出失败时返回 [`ProbeError::Aborted`](crate::error::ProbeError::Aborted)，
/// 其中带有已经累计的部分统计。
pub fn write_results<S: ResultSink>(
    mut sink: S,
    queue: &JoinableQueue<ResultMessage>,
    flush_every: u64,
) -> Result<Tally> {
    let flush_every = flush_every.max(1);
    let mut tally = Tally::default();

    #[cfg(feature = "logging")]
    tracing::info!("写入线程启动，输出: {}，每 {} 条刷盘", sink.name(), flush_every);

    drain_results(&mut sink, queue, flush_every, &mut tally)
        .and_then(|()| sink.finalize())
        .map_err(|e| e.aborted(tally))?;

    #[cfg(feature = "logging")]
    tracing::info!("写入线程退出，{}", tally);

    Ok(tally)
}
