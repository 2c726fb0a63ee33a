//! 可等待的共享队列
//!
//! 在 `mpsc` 通道之上加一个"未确认计数"：每次入队加一，每次 `acknowledge` 减一，
//! `join_all` 阻塞直到计数归零。多个消费者通过 `Arc<Mutex<Receiver>>` 共享接收端。

use crate::error::{ProbeError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};

/// 队列统计
#[derive(Debug, Default)]
pub struct QueueStats {
    pub enqueued: AtomicU64,
    pub dequeued: AtomicU64,
    pub acknowledged: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Relaxed)
    }
}

struct Shared<T> {
    receiver: Mutex<mpsc::Receiver<T>>,
    /// 已入队但尚未确认的条目数
    pending: Mutex<usize>,
    drained: Condvar,
    stats: QueueStats,
}

/// 支持确认和等待排空的无界 FIFO 队列
///
/// 克隆得到的是同一个队列的另一个句柄。
pub struct JoinableQueue<T> {
    sender: mpsc::Sender<T>,
    shared: Arc<Shared<T>>,
}

impl<T> Clone for JoinableQueue<T> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone(), shared: Arc::clone(&self.shared) }
    }
}

impl<T> Default for JoinableQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JoinableQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            shared: Arc::new(Shared {
                receiver: Mutex::new(receiver),
                pending: Mutex::new(0),
                drained: Condvar::new(),
                stats: QueueStats::default(),
            }),
        }
    }

    /// 入队，不阻塞
    pub fn enqueue(&self, item: T) -> Result<()> {
        // 先计数再发送，保证消费者确认时计数不会下溢
        *self.lock_pending()? += 1;
        if self.sender.send(item).is_err() {
            let mut pending = self.lock_pending()?;
            *pending -= 1;
            return Err(ProbeError::queue_error("接收端已关闭"));
        }
        self.shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 出队，队列为空时阻塞
    pub fn dequeue(&self) -> Result<T> {
        let receiver = self
            .shared
            .receiver
            .lock()
            .map_err(|_| ProbeError::queue_error("接收端锁已中毒"))?;
        let item = receiver
            .recv()
            .map_err(|_| ProbeError::queue_error("发送端已全部关闭"))?;
        self.shared.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Ok(item)
    }

    /// 确认一个已出队的条目处理完成
    pub fn acknowledge(&self) -> Result<()> {
        let mut pending = self.lock_pending()?;
        if *pending == 0 {
            return Err(ProbeError::queue_error("确认次数多于入队条目数"));
        }
        *pending -= 1;
        self.shared.stats.acknowledged.fetch_add(1, Ordering::Relaxed);
        if *pending == 0 {
            self.shared.drained.notify_all();
        }
        Ok(())
    }

    /// 阻塞直到所有入队条目（包括结束信号）都被确认
    pub fn join_all(&self) -> Result<()> {
        let mut pending = self.lock_pending()?;
        while *pending > 0 {
            pending = self
                .shared
                .drained
                .wait(pending)
                .map_err(|_| ProbeError::queue_error("计数锁已中毒"))?;
        }
        Ok(())
    }

    /// 尚未确认的条目数
    pub fn outstanding(&self) -> usize {
        self.shared.pending.lock().map(|pending| *pending).unwrap_or(0)
    }

    pub fn stats(&self) -> &QueueStats {
        &self.shared.stats
    }

    fn lock_pending(&self) -> Result<std::sync::MutexGuard<'_, usize>> {
        self.shared
            .pending
            .lock()
            .map_err(|_| ProbeError::queue_error("计数锁已中毒"))
    }
}

/// 在析构时确认一个条目
///
/// 出队后立即创建，无论处理成功、失败还是 panic 都会确认，
/// 加载线程的 `join_all` 因此不会被单个条目卡住。
pub struct AckGuard<'a, T> {
    queue: &'a JoinableQueue<T>,
}

impl<'a, T> AckGuard<'a, T> {
    pub fn new(queue: &'a JoinableQueue<T>) -> Self {
        Self { queue }
    }
}

impl<T> Drop for AckGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(_e) = self.queue.acknowledge() {
            #[cfg(feature = "logging")]
            tracing::error!("确认队列条目失败: {}", _e);
        }
    }
}
