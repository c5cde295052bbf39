//! 输出收集器契约与内存实现

use std::sync::{Arc, Mutex};

use futures_util::stream::{self, BoxStream, StreamExt};

use ate_common::{CommandOutput, StreamKind};

/// 输出收集器工厂
pub trait CollectorFactory: Send + Sync {
    /// 为给定标签创建收集器
    fn make_collector(&self, label: &str) -> Arc<dyn OutputCollector>;
}

/// 输出收集器
///
/// 执行方逐行写入，期望方按流读取，快照用于写入运行数据存储。
pub trait OutputCollector: Send + Sync {
    /// 追加一行输出
    fn append(&self, stream: StreamKind, line: &str);

    /// 当前输出快照
    fn snapshot(&self) -> CommandOutput;

    /// 指定流的行序列（流在已收集内容的末尾结束）
    fn lines(&self, stream: StreamKind) -> BoxStream<'static, String>;
}

/// 进程内内存收集器
#[derive(Debug, Default)]
pub struct MemoryCollector {
    label: String,
    stdout: Mutex<Vec<String>>,
    stderr: Mutex<Vec<String>>,
}

impl MemoryCollector {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    /// 收集器标签
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl OutputCollector for MemoryCollector {
    fn append(&self, stream: StreamKind, line: &str) {
        let buffer = match stream {
            StreamKind::Stdout => &self.stdout,
            StreamKind::Stderr => &self.stderr,
        };
        buffer.lock().unwrap().push(line.to_string());
    }

    fn snapshot(&self) -> CommandOutput {
        CommandOutput {
            stdout: self.stdout.lock().unwrap().join("\n"),
            stderr: self.stderr.lock().unwrap().join("\n"),
        }
    }

    fn lines(&self, stream: StreamKind) -> BoxStream<'static, String> {
        let lines = match stream {
            StreamKind::Stdout => self.stdout.lock().unwrap().clone(),
            StreamKind::Stderr => self.stderr.lock().unwrap().clone(),
        };
        stream::iter(lines).boxed()
    }
}

/// 内存收集器工厂
///
/// 保留已创建的收集器（按创建顺序），供执行后检查输出。
#[derive(Debug, Default)]
pub struct MemoryCollectorFactory {
    collectors: Mutex<Vec<Arc<MemoryCollector>>>,
}

impl MemoryCollectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已创建的收集器
    pub fn collectors(&self) -> Vec<Arc<MemoryCollector>> {
        self.collectors.lock().unwrap().clone()
    }
}

impl CollectorFactory for MemoryCollectorFactory {
    fn make_collector(&self, label: &str) -> Arc<dyn OutputCollector> {
        let collector = Arc::new(MemoryCollector::new(label));
        self.collectors.lock().unwrap().push(Arc::clone(&collector));
        collector
    }
}
