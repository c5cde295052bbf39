//! 动作配置模型
//!
//! 配置以已解析的结构消费（文件加载与渲染不在引擎范围内）；动作
//! 变体是带 `type` 标签的和类型，由 maker 穷尽匹配构造动作，未知
//! 变体在反序列化阶段即被拒绝。

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ate_common::{Parameters, StreamKind};

/// 相对先前失败的执行条件（由 sequential 父动作求值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum When {
    /// 总是执行
    #[default]
    Always,
    /// 仅当之前没有失败时执行
    OnSuccess,
    /// 仅当之前至少有一次失败时执行
    OnFailure,
}

/// 失败策略（由组合调用方消费）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// 失败即终止
    #[default]
    Fail,
    /// 失败后继续
    Skip,
}

/// 生命周期动作配置 (start/stop/restart/reload)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// 单个目标服务（追加在 services 列表之后）
    #[serde(default)]
    pub service: Option<String>,

    /// 目标服务列表；与 service 合并后为空时回退到全部已知服务
    #[serde(default)]
    pub services: Vec<String>,

    /// 超时（秒；0 或缺省使用调用方默认值）
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

impl LifecycleConfig {
    /// 合并后的显式目标列表（单数 service 追加在列表末尾）
    pub fn merged_targets(&self) -> Vec<String> {
        let mut names = self.services.clone();
        if let Some(name) = &self.service {
            names.push(name.clone());
        }
        names
    }
}

/// 请求动作配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// 结果键 id（响应快照写入 `response/<id>`）
    #[serde(default)]
    pub id: Option<String>,

    /// 目标服务
    pub service: String,

    /// HTTP 方法
    #[serde(default = "default_method")]
    pub method: String,

    /// 请求路径
    #[serde(default = "default_path")]
    pub path: String,

    /// 附加请求头
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// 请求体
    #[serde(default)]
    pub body: Option<String>,

    /// 分块大小（字节；与 chunk_delay_ms 配合产生受控分块请求体）
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// 分块间延迟（毫秒）
    #[serde(default)]
    pub chunk_delay_ms: Option<u64>,

    /// 是否对路径做标准转义；为 false 时按已编码的原样使用
    #[serde(default = "default_true")]
    pub encode_path: bool,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,

    #[serde(default)]
    pub on_failure: OnFailure,
}

/// 命令动作配置
///
/// shell 与 args 两种形式二选一。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandConfig {
    /// 结果键 id（输出快照写入 `command/<id>`）
    #[serde(default)]
    pub id: Option<String>,

    /// 目标服务
    pub service: String,

    /// shell 形式：整行命令，翻译为 `sh -c "<line>"`
    #[serde(default)]
    pub shell: Option<String>,

    /// 参数形式：首元素为可执行文件，其余为参数
    #[serde(default)]
    pub args: Option<Vec<String>>,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,

    #[serde(default)]
    pub on_failure: OnFailure,
}

/// 执行动作配置
///
/// 与命令动作相同的命令形式，另外支持模板渲染。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteConfig {
    #[serde(default)]
    pub id: Option<String>,

    pub service: String,

    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default)]
    pub args: Option<Vec<String>>,

    /// 启用后，命令名与每个参数都先经服务的模板渲染器处理
    #[serde(default)]
    pub render: bool,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,

    #[serde(default)]
    pub on_failure: OnFailure,
}

/// 压测动作配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// 结果键 id（指标快照写入 `metrics/<id>`）
    #[serde(default)]
    pub id: Option<String>,

    /// 目标服务
    pub service: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default = "default_path")]
    pub path: String,

    /// 每秒请求数
    pub rate: u64,

    /// 压测时长（秒；缺省由超时推导）
    #[serde(default)]
    pub duration: Option<u64>,

    /// 超时（秒；缺省由时长推导）
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

/// not 组合动作配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotConfig {
    /// 唯一的子动作
    pub action: Box<ActionConfig>,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

/// parallel 组合动作配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// 并发执行的子动作列表
    pub actions: Vec<ActionConfig>,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

/// sequential 组合动作配置
///
/// 内联动作列表与命名序列（service + name）二选一。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequentialConfig {
    /// 内联子动作列表
    #[serde(default)]
    pub actions: Vec<ActionConfig>,

    /// 命名序列所在的服务
    #[serde(default)]
    pub service: Option<String>,

    /// 命名序列名称（在服务的服务器上查找）
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,

    #[serde(default)]
    pub on_failure: OnFailure,
}

/// 期望消息的匹配顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrder {
    /// 固定顺序：下一条未匹配消息必须匹配下一行
    #[default]
    Fixed,
    /// 任意顺序：首个匹配的消息从待匹配集合移除
    Any,
}

/// 输出期望配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputExpectConfig {
    /// 目标服务
    pub service: String,

    /// 读取的输出流
    #[serde(default)]
    pub stream: StreamKind,

    /// 期望消息（字面或正则）
    pub messages: Vec<String>,

    #[serde(default)]
    pub order: MessageOrder,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

/// 响应期望配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseExpectConfig {
    /// 请求动作的结果键 id（读取 `response/<id>`）
    pub id: String,

    /// 期望状态码
    #[serde(default)]
    pub status_code: Option<u16>,

    /// 期望状态行文本
    #[serde(default)]
    pub status: Option<String>,

    /// 期望响应体（字面或正则）
    #[serde(default)]
    pub body: Option<String>,

    /// 期望响应头（逐项匹配）
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

/// 指标比较算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

/// 单条指标规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRule {
    /// 指标名称
    pub metric: String,

    /// 比较算子
    pub op: MetricOp,

    /// 期望值
    pub value: f64,
}

/// 指标期望配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsExpectConfig {
    /// 压测动作的结果键 id（读取 `metrics/<id>`）
    pub id: String,

    /// 全部规则都满足才算通过
    pub rules: Vec<MetricRule>,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

/// 自定义期望配置
///
/// 引用服务的服务器上预定义的期望，按配置级 → 服务器级 → 期望级
/// 的顺序合并参数（后者覆盖前者）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomExpectConfig {
    /// 预定义期望所在的服务
    pub service: String,

    /// 预定义期望名称
    pub name: String,

    /// 配置级参数
    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub when: When,
}

/// 动作配置变体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    Request(RequestConfig),
    Command(CommandConfig),
    Execute(ExecuteConfig),
    Bench(BenchConfig),
    Start(LifecycleConfig),
    Stop(LifecycleConfig),
    Restart(LifecycleConfig),
    Reload(LifecycleConfig),
    Not(NotConfig),
    Parallel(ParallelConfig),
    Sequential(SequentialConfig),
    ExpectOutput(OutputExpectConfig),
    ExpectResponse(ResponseExpectConfig),
    ExpectMetrics(MetricsExpectConfig),
    ExpectCustom(CustomExpectConfig),
}

/// 测试场景
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// 场景名称
    pub name: String,

    /// 场景描述
    #[serde(default)]
    pub description: Option<String>,

    /// 标签
    #[serde(default)]
    pub tags: Vec<String>,

    /// 根动作列表
    pub actions: Vec<ActionConfig>,
}

impl Scenario {
    /// 从 YAML 字符串加载场景
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| crate::ActionError::Config(e.to_string()))
    }

    /// 从 JSON 字符串加载场景
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::ActionError::Config(e.to_string()))
    }

    /// 导出为 YAML
    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self).map_err(|e| crate::ActionError::Config(e.to_string()))
    }

    /// 导出为 JSON
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::ActionError::Config(e.to_string()))
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

/// 把配置超时（秒；0 视为未设置）换算为有效超时
pub(crate) fn effective_timeout(configured: Option<u64>, default: Duration) -> Duration {
    match configured {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => default,
    }
}
