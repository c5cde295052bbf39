//! 服务与定位器契约

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use ate_common::{Command, ExecContext, Parameters};

use crate::collector::OutputCollector;
use crate::{Result, ServiceError};

/// 预定义期望（挂在服务器上，按名称查找）
#[derive(Debug, Clone)]
pub struct ExpectationDef {
    /// 期望种类："output" 或 "response"
    pub kind: String,

    /// 期望级参数
    pub parameters: Parameters,
}

/// 服务器引用 - 提供命名动作序列、预定义期望与服务器级参数
pub trait Server: Send + Sync {
    /// 按名称查找预定义动作序列（已解析的配置节点列表）
    fn sequence(&self, name: &str) -> Option<Vec<Value>>;

    /// 按名称查找预定义期望
    fn expectation(&self, name: &str) -> Option<ExpectationDef>;

    /// 服务器级参数
    fn parameters(&self) -> Parameters;
}

/// 被测服务能力对象
///
/// 动作在构造时解析服务引用并在执行时调用其能力；服务对象在
/// 构造完成后只读共享。
#[async_trait]
pub trait Service: Send + Sync {
    /// 服务名称
    fn name(&self) -> &str;

    /// 解析给定路径的公开访问 URL
    fn public_url(&self, path: &str) -> Result<String>;

    async fn start(&self, ctx: &ExecContext) -> Result<()>;

    async fn stop(&self, ctx: &ExecContext) -> Result<()>;

    async fn restart(&self, ctx: &ExecContext) -> Result<()>;

    async fn reload(&self, ctx: &ExecContext) -> Result<()>;

    /// 在服务环境内执行命令，输出写入给定的收集器
    async fn exec_command(
        &self,
        ctx: &ExecContext,
        command: &Command,
        collector: Arc<dyn OutputCollector>,
    ) -> Result<()>;

    /// 用给定参数渲染模板文本
    fn render_template(&self, text: &str, parameters: &Parameters) -> Result<String>;

    /// 所属服务器引用
    fn server(&self) -> Arc<dyn Server>;

    /// 服务器解析后的参数（模板渲染的输入）
    fn server_parameters(&self) -> Parameters {
        self.server().parameters()
    }

    /// 服务自身沙箱输出的收集器（输出期望从这里读取）
    fn output(&self) -> Arc<dyn OutputCollector>;
}

/// 服务定位器
pub trait ServiceLocator: Send + Sync {
    /// 按名称查找服务
    fn find(&self, name: &str) -> Result<Arc<dyn Service>>;

    /// 全部已知服务（动作未显式指定目标时的回退集合）
    fn services(&self) -> Vec<Arc<dyn Service>>;
}

/// 基于内存映射的静态定位器
///
/// 按注册顺序保存服务，回退集合按同一顺序迭代。
#[derive(Default)]
pub struct StaticLocator {
    services: Vec<(String, Arc<dyn Service>)>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册服务
    pub fn register(&mut self, service: Arc<dyn Service>) {
        self.services
            .push((service.name().to_string(), service));
    }
}

impl ServiceLocator for StaticLocator {
    fn find(&self, name: &str) -> Result<Arc<dyn Service>> {
        self.services
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, service)| Arc::clone(service))
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }

    fn services(&self) -> Vec<Arc<dyn Service>> {
        self.services
            .iter()
            .map(|(_, service)| Arc::clone(service))
            .collect()
    }
}

/// 静态服务器定义
#[derive(Debug, Clone, Default)]
pub struct StaticServer {
    sequences: HashMap<String, Vec<Value>>,
    expectations: HashMap<String, ExpectationDef>,
    parameters: Parameters,
}

impl StaticServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加命名动作序列
    pub fn with_sequence(mut self, name: &str, nodes: Vec<Value>) -> Self {
        self.sequences.insert(name.to_string(), nodes);
        self
    }

    /// 添加预定义期望
    pub fn with_expectation(mut self, name: &str, def: ExpectationDef) -> Self {
        self.expectations.insert(name.to_string(), def);
        self
    }

    /// 设置服务器级参数
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

impl Server for StaticServer {
    fn sequence(&self, name: &str) -> Option<Vec<Value>> {
        self.sequences.get(name).cloned()
    }

    fn expectation(&self, name: &str) -> Option<ExpectationDef> {
        self.expectations.get(name).cloned()
    }

    fn parameters(&self) -> Parameters {
        self.parameters.clone()
    }
}
