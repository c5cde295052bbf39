//! 压测指标 - 攻击结果的聚合与快照

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 压测目标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackTarget {
    /// HTTP 方法
    pub method: String,

    /// 完整目标 URL
    pub url: String,
}

/// 单次攻击请求的结果样本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackResult {
    /// 响应状态码（传输失败时为 0）
    pub status_code: u16,

    /// 请求耗时
    pub latency: Duration,

    /// 响应体字节数
    #[serde(default)]
    pub bytes_in: u64,

    /// 请求体字节数
    #[serde(default)]
    pub bytes_out: u64,

    /// 传输错误描述
    #[serde(default)]
    pub error: Option<String>,
}

/// 指标聚合器
///
/// 逐条 [`Metrics::add`] 攻击结果，结束后 [`Metrics::close`] 计算派生
/// 指标，再通过 [`Metrics::snapshot`] 导出可存储的快照。
#[derive(Debug, Default)]
pub struct Metrics {
    latencies: Vec<Duration>,
    requests: u64,
    success: u64,
    bytes_in: u64,
    bytes_out: u64,
    status_codes: HashMap<String, u64>,
    errors: Vec<String>,
    computed: MetricsSnapshot,
}

impl Metrics {
    /// 创建空聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加一条攻击结果
    pub fn add(&mut self, result: &AttackResult) {
        self.requests += 1;
        if result.error.is_none() && (200..300).contains(&result.status_code) {
            self.success += 1;
        }
        self.latencies.push(result.latency);
        self.bytes_in += result.bytes_in;
        self.bytes_out += result.bytes_out;
        *self
            .status_codes
            .entry(result.status_code.to_string())
            .or_insert(0) += 1;
        if let Some(error) = &result.error {
            if !self.errors.contains(error) {
                self.errors.push(error.clone());
            }
        }
    }

    /// 结束聚合并计算派生指标
    pub fn close(&mut self) {
        self.latencies.sort_unstable();
        let mean = if self.latencies.is_empty() {
            Duration::ZERO
        } else {
            self.latencies.iter().sum::<Duration>() / self.latencies.len() as u32
        };
        self.computed = MetricsSnapshot {
            requests: self.requests,
            success: if self.requests == 0 {
                0.0
            } else {
                self.success as f64 / self.requests as f64
            },
            latency_mean: mean.as_secs_f64(),
            latency_p50: self.percentile(0.50).as_secs_f64(),
            latency_p95: self.percentile(0.95).as_secs_f64(),
            latency_p99: self.percentile(0.99).as_secs_f64(),
            latency_max: self.latencies.last().copied().unwrap_or_default().as_secs_f64(),
            bytes_in: self.bytes_in,
            bytes_out: self.bytes_out,
            status_codes: self.status_codes.clone(),
            errors: self.errors.clone(),
        };
    }

    /// 导出快照（须先 close）
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.computed.clone()
    }

    fn percentile(&self, p: f64) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let rank = (self.latencies.len() as f64 * p).ceil() as usize;
        self.latencies[rank.clamp(1, self.latencies.len()) - 1]
    }
}

/// 指标快照（由压测动作写入 `metrics/<id>`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// 请求总数
    pub requests: u64,

    /// 成功率 [0, 1]
    pub success: f64,

    /// 平均延迟（秒）
    pub latency_mean: f64,

    /// 中位延迟（秒）
    pub latency_p50: f64,

    /// 95 分位延迟（秒）
    pub latency_p95: f64,

    /// 99 分位延迟（秒）
    pub latency_p99: f64,

    /// 最大延迟（秒）
    pub latency_max: f64,

    /// 响应字节总数
    pub bytes_in: u64,

    /// 请求字节总数
    pub bytes_out: u64,

    /// 状态码分布
    #[serde(default)]
    pub status_codes: HashMap<String, u64>,

    /// 去重后的错误列表
    #[serde(default)]
    pub errors: Vec<String>,
}

impl MetricsSnapshot {
    /// 按名称查询指标值，供指标期望的规则求值
    ///
    /// 支持的名称：`requests`、`success`、`latency_mean`、`latency_p50`、
    /// `latency_p95`、`latency_p99`、`latency_max`、`bytes_in`、`bytes_out`。
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "requests" => Some(self.requests as f64),
            "success" => Some(self.success),
            "latency_mean" => Some(self.latency_mean),
            "latency_p50" => Some(self.latency_p50),
            "latency_p95" => Some(self.latency_p95),
            "latency_p99" => Some(self.latency_p99),
            "latency_max" => Some(self.latency_max),
            "bytes_in" => Some(self.bytes_in as f64),
            "bytes_out" => Some(self.bytes_out as f64),
            _ => None,
        }
    }
}
