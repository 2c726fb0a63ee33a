//! 写入统计信息模块

/// 写入统计信息
#[derive(Debug, Default, Clone)]
pub struct SinkStats {
    /// 已写入的记录数
    pub written_records: usize,
    /// 强制刷盘次数（不含结束时的刷盘）
    pub flushes: usize,
    /// 写入开始时间
    pub start_time: Option<std::time::Instant>,
    /// 写入完成时间
    pub end_time: Option<std::time::Instant>,
}

impl SinkStats {
    /// 创建新的统计信息，记录开始时间
    pub fn new() -> Self {
        Self {
            start_time: Some(std::time::Instant::now()),
            ..Default::default()
        }
    }

    /// 标记写入完成，记录结束时间
    pub fn finish(&mut self) {
        self.end_time = Some(std::time::Instant::now());
    }

    /// 计算写入持续时间
    pub fn duration(&self) -> Option<std::time::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// 计算每秒写入记录数
    pub fn records_per_second(&self) -> Option<f64> {
        self.duration().map(|d| {
            if d.as_secs_f64() > 0.0 {
                self.written_records as f64 / d.as_secs_f64()
            } else {
                0.0
            }
        })
    }
}

impl std::fmt::Display for SinkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "写入: {}, 刷盘: {}", self.written_records, self.flushes)?;

        if let Some(duration) = self.duration() {
            write!(f, ", 耗时: {:.2}s", duration.as_secs_f64())?;

            if let Some(rps) = self.records_per_second() {
                write!(f, ", 速度: {:.2} 记录/秒", rps)?;
            }
        }

        Ok(())
    }
}
