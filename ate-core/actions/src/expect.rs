//! 期望动作
//!
//! 终结动作：读取此前写入运行数据或服务沙箱输出的结果并与期望值
//! 比较。不匹配是受控失败（无错误）；数据缺失或无法解码是操作性
//! 错误，便于组合动作区分策略。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use regex::Regex;
use tracing::debug;

use ate_common::{
    ExecContext, MetricsSnapshot, Parameters, ResponseData, RunData, StreamKind,
};
use ate_service::{OutputCollector, Server, Service, ServiceLocator};

use crate::action::{Action, Outcome};
use crate::config::{
    effective_timeout, CustomExpectConfig, MessageOrder, MetricOp, MetricRule,
    MetricsExpectConfig, OutputExpectConfig, ResponseExpectConfig, When,
};
use crate::{ActionError, Result};

/// 期望消息：字面包含优先，可解析为正则时同时尝试正则匹配
#[derive(Debug)]
struct Message {
    text: String,
    pattern: Option<Regex>,
}

impl Message {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            pattern: Regex::new(text).ok(),
        }
    }

    fn matches(&self, line: &str) -> bool {
        line.contains(&self.text)
            || self
                .pattern
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(line))
    }
}

/// 输出期望
///
/// 从服务沙箱输出的指定流逐行读取：固定顺序模式下，下一条待匹配
/// 消息必须匹配接下来出现的行；任意顺序模式下，首个匹配（字面或
/// 正则）的消息从待匹配集合移除。集合清空即成功，流先结束则失败。
pub struct OutputExpectation {
    service: Arc<dyn Service>,
    stream: StreamKind,
    messages: Vec<Message>,
    order: MessageOrder,
    timeout: Duration,
    when: When,
}

impl OutputExpectation {
    pub fn new(
        config: &OutputExpectConfig,
        locator: &dyn ServiceLocator,
        default_timeout: Duration,
    ) -> Result<Self> {
        let service = locator.find(&config.service)?;
        Ok(Self {
            service,
            stream: config.stream,
            messages: config.messages.iter().map(|m| Message::new(m)).collect(),
            order: config.order,
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
        })
    }

    async fn run(&self, ctx: &ExecContext) -> Result<bool> {
        let mut pending: Vec<&Message> = self.messages.iter().collect();
        let mut lines = self.service.output().lines(self.stream);
        while !pending.is_empty() {
            let line = match ctx.run_until(lines.next()).await? {
                Some(line) => line,
                None => {
                    debug!(remaining = pending.len(), "输出流已结束，仍有未匹配消息");
                    return Ok(false);
                }
            };
            match self.order {
                MessageOrder::Fixed => {
                    if pending[0].matches(&line) {
                        pending.remove(0);
                    }
                }
                MessageOrder::Any => {
                    if let Some(found) = pending.iter().position(|m| m.matches(&line)) {
                        pending.remove(found);
                    }
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Action for OutputExpectation {
    async fn execute(&self, ctx: &ExecContext, _data: &RunData) -> Outcome {
        Outcome::from_result(self.run(ctx).await)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }
}

/// 响应期望
///
/// 从 `response/<id>` 读取请求动作存入的响应快照并逐项比较配置的
/// 期望值；键缺失或快照无法解码是操作性错误。
pub struct ResponseExpectation {
    id: String,
    status_code: Option<u16>,
    status: Option<String>,
    body: Option<Message>,
    headers: HashMap<String, String>,
    timeout: Duration,
    when: When,
}

impl ResponseExpectation {
    pub fn new(config: &ResponseExpectConfig, default_timeout: Duration) -> Self {
        Self {
            id: config.id.clone(),
            status_code: config.status_code,
            status: config.status.clone(),
            body: config.body.as_deref().map(Message::new),
            headers: config.headers.clone(),
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
        }
    }

    async fn run(&self, data: &RunData) -> Result<bool> {
        let key = format!("response/{}", self.id);
        let value = data
            .load(&key)
            .await
            .ok_or_else(|| ActionError::NotFound(key.clone()))?;
        let response: ResponseData = serde_json::from_value(value)
            .map_err(|e| ActionError::Decode(format!("{key}: {e}")))?;

        if let Some(expected) = self.status_code {
            if response.status_code != expected {
                debug!(expected, actual = response.status_code, "状态码不匹配");
                return Ok(false);
            }
        }
        if let Some(expected) = &self.status {
            if &response.status != expected {
                return Ok(false);
            }
        }
        if let Some(expected) = &self.body {
            if !expected.matches(&response.body) {
                debug!("响应体不匹配");
                return Ok(false);
            }
        }
        for (name, expected) in &self.headers {
            let matched = response
                .headers
                .get(&name.to_ascii_lowercase())
                .is_some_and(|values| values.iter().any(|value| value == expected));
            if !matched {
                debug!(header = %name, "响应头不匹配");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Action for ResponseExpectation {
    async fn execute(&self, _ctx: &ExecContext, data: &RunData) -> Outcome {
        Outcome::from_result(self.run(data).await)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }
}

/// 指标期望
///
/// 从 `metrics/<id>` 读取压测动作存入的指标快照并逐条求值规则；
/// 全部规则满足才算通过。未知指标名或无法解码的快照是操作性错误。
pub struct MetricsExpectation {
    id: String,
    rules: Vec<MetricRule>,
    timeout: Duration,
    when: When,
}

impl MetricsExpectation {
    pub fn new(config: &MetricsExpectConfig, default_timeout: Duration) -> Self {
        Self {
            id: config.id.clone(),
            rules: config.rules.clone(),
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
        }
    }

    async fn run(&self, data: &RunData) -> Result<bool> {
        let key = format!("metrics/{}", self.id);
        let value = data
            .load(&key)
            .await
            .ok_or_else(|| ActionError::NotFound(key.clone()))?;
        let snapshot: MetricsSnapshot = serde_json::from_value(value)
            .map_err(|e| ActionError::Decode(format!("{key}: {e}")))?;

        for rule in &self.rules {
            let actual = snapshot
                .metric(&rule.metric)
                .ok_or_else(|| ActionError::UnknownMetric(rule.metric.clone()))?;
            let satisfied = match rule.op {
                MetricOp::Eq => (actual - rule.value).abs() <= f64::EPSILON,
                MetricOp::Gt => actual > rule.value,
                MetricOp::Ge => actual >= rule.value,
                MetricOp::Lt => actual < rule.value,
                MetricOp::Le => actual <= rule.value,
            };
            if !satisfied {
                debug!(
                    metric = %rule.metric,
                    actual,
                    op = ?rule.op,
                    expected = rule.value,
                    "指标规则不满足"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Action for MetricsExpectation {
    async fn execute(&self, _ctx: &ExecContext, data: &RunData) -> Outcome {
        Outcome::from_result(self.run(data).await)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }
}

/// 自定义期望
///
/// 在构造时解析服务的服务器上预定义的期望，按配置级 → 服务器级 →
/// 期望级的顺序合并参数（后者覆盖前者），再按定义的种类委派给
/// 输出期望或响应期望的逻辑；未知种类是类型化的不支持错误。
pub struct CustomExpectation {
    inner: Arc<dyn Action>,
    timeout: Duration,
    when: When,
}

impl CustomExpectation {
    pub fn new(
        config: &CustomExpectConfig,
        locator: &dyn ServiceLocator,
        default_timeout: Duration,
    ) -> Result<Self> {
        let service = locator.find(&config.service)?;
        let def = service.server().expectation(&config.name).ok_or_else(|| {
            ActionError::Config(format!("服务器上没有名为 {} 的期望", config.name))
        })?;

        let mut merged = Parameters::new();
        merged.extend(config.parameters.clone());
        merged.extend(service.server().parameters());
        merged.extend(def.parameters.clone());
        merged
            .entry("service".to_string())
            .or_insert_with(|| serde_json::Value::String(config.service.clone()));

        let merged = serde_json::Value::Object(merged);
        let inner: Arc<dyn Action> = match def.kind.as_str() {
            "output" => {
                let inner_config: OutputExpectConfig = serde_json::from_value(merged)
                    .map_err(|e| {
                        ActionError::Config(format!("期望 {} 参数无效: {e}", config.name))
                    })?;
                Arc::new(OutputExpectation::new(&inner_config, locator, default_timeout)?)
            }
            "response" => {
                let inner_config: ResponseExpectConfig = serde_json::from_value(merged)
                    .map_err(|e| {
                        ActionError::Config(format!("期望 {} 参数无效: {e}", config.name))
                    })?;
                Arc::new(ResponseExpectation::new(&inner_config, default_timeout))
            }
            other => return Err(ActionError::UnsupportedExpectation(other.to_string())),
        };

        Ok(Self {
            inner,
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
        })
    }
}

#[async_trait]
impl Action for CustomExpectation {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        self.inner.execute(ctx, data).await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }
}
