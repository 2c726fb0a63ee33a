//! 集成测试公共模块

#![allow(dead_code)]

use blockprobe::Result;
use blockprobe::pipeline::ResultRecord;
use blockprobe::session::{ProbeSession, SessionError, SessionFactory};
use blockprobe::sink::ResultSink;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// 创建测试用的数据集文件
pub fn write_dataset(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
    let file_path = dir.path().join(filename);
    fs::write(&file_path, content).expect("Failed to write test dataset");
    file_path
}

/// 某个地址被访问时会话的表现
#[derive(Debug, Clone)]
pub enum Script {
    Signal(bool),
    Prompt,
    DriverError(String),
    /// 访问时会话所在线程 panic
    Panic,
}

/// 按地址脚本化的会话工厂
#[derive(Default)]
pub struct ScriptedFactory {
    script: Arc<HashMap<String, Script>>,
    failing_workers: HashSet<usize>,
    delay: Option<Duration>,
    pub acquired: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub visited: Arc<Mutex<Vec<(usize, String)>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, address: &str, script: Script) -> Self {
        Arc::make_mut(&mut self.script).insert(address.to_string(), script);
        self
    }

    pub fn failing_worker(mut self, worker_id: usize) -> Self {
        self.failing_workers.insert(worker_id);
        self
    }

    /// 每次访问前休眠，模拟慢速浏览器
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn visited_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .visited
            .lock()
            .unwrap()
            .iter()
            .map(|(_, address)| address.clone())
            .collect();
        addresses.sort();
        addresses
    }

    pub fn distinct_workers(&self) -> usize {
        self.visited
            .lock()
            .unwrap()
            .iter()
            .map(|(worker_id, _)| *worker_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

pub struct ScriptedSession {
    worker_id: usize,
    script: Arc<HashMap<String, Script>>,
    current: Option<Script>,
    delay: Option<Duration>,
    released: Arc<AtomicUsize>,
    visited: Arc<Mutex<Vec<(usize, String)>>>,
}

impl ProbeSession for ScriptedSession {
    fn visit(&mut self, address: &str) -> std::result::Result<(), SessionError> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.visited
            .lock()
            .unwrap()
            .push((self.worker_id, address.to_string()));

        let script = self
            .script
            .get(address)
            .cloned()
            .unwrap_or(Script::Signal(false));
        match &script {
            Script::DriverError(message) => {
                self.current = None;
                Err(SessionError::Driver(message.clone()))
            }
            Script::Panic => panic!("session for worker {} crashed", self.worker_id),
            _ => {
                self.current = Some(script);
                Ok(())
            }
        }
    }

    fn signal(&mut self) -> std::result::Result<bool, SessionError> {
        match self.current.take() {
            Some(Script::Signal(signal)) => Ok(signal),
            Some(Script::Prompt) => Err(SessionError::UnexpectedPrompt("alert".to_string())),
            _ => Err(SessionError::Driver("no page loaded".to_string())),
        }
    }

    fn release(self) -> std::result::Result<(), SessionError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SessionFactory for ScriptedFactory {
    type Session = ScriptedSession;

    fn acquire(&self, worker_id: usize) -> std::result::Result<ScriptedSession, SessionError> {
        if self.failing_workers.contains(&worker_id) {
            return Err(SessionError::Driver(format!("worker {worker_id} has no browser")));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            worker_id,
            script: Arc::clone(&self.script),
            current: None,
            delay: self.delay,
            released: Arc::clone(&self.released),
            visited: Arc::clone(&self.visited),
        })
    }
}

/// 内存结果输出，克隆得到同一份数据的句柄
#[derive(Clone, Default)]
pub struct MemorySink {
    pub records: Arc<Mutex<Vec<ResultRecord>>>,
    pub flushes: Arc<AtomicU64>,
    pub finalized: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn record_for(&self, address: &str) -> Option<ResultRecord> {
        self.records()
            .into_iter()
            .find(|record| record.address == address)
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst) > 0
    }
}

impl ResultSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write_record(&mut self, record: &ResultRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 检查写入顺序的结果输出
///
/// 记录 `finalize` 时已释放的会话数，以及 `finalize` 之后到达的写入。
#[derive(Clone)]
pub struct OrderingSink {
    pub records: Arc<Mutex<Vec<ResultRecord>>>,
    released: Arc<AtomicUsize>,
    finalized: Arc<Mutex<bool>>,
    pub released_at_finalize: Arc<AtomicUsize>,
    pub late_writes: Arc<AtomicU64>,
}

impl OrderingSink {
    pub fn new(factory: &ScriptedFactory) -> Self {
        Self {
            records: Arc::default(),
            released: Arc::clone(&factory.released),
            finalized: Arc::default(),
            released_at_finalize: Arc::default(),
            late_writes: Arc::default(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        *self.finalized.lock().unwrap()
    }
}

impl ResultSink for OrderingSink {
    fn name(&self) -> &str {
        "ordering"
    }

    fn write_record(&mut self, record: &ResultRecord) -> Result<()> {
        if *self.finalized.lock().unwrap() {
            self.late_writes.fetch_add(1, Ordering::SeqCst);
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.released_at_finalize
            .store(self.released.load(Ordering::SeqCst), Ordering::SeqCst);
        *self.finalized.lock().unwrap() = true;
        Ok(())
    }
}
