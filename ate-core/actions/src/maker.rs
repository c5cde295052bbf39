//! 动作构造与分发
//!
//! 对配置变体做穷尽匹配，委派到各变体的子构造器；组合变体的子构造
//! 器通过 maker 自身递归构造子动作（分发能力作为参数传入，不在
//! 构造期存回引用，避免初始化环）。

use std::sync::Arc;
use std::time::Duration;

use ate_service::{Attacker, CollectorFactory, HttpClient, Server, Service, ServiceLocator};

use crate::action::Action;
use crate::bench::BenchAction;
use crate::command::{CommandAction, ExecuteAction};
use crate::composite::{NotAction, ParallelAction, SequentialAction};
use crate::config::{effective_timeout, ActionConfig, SequentialConfig};
use crate::expect::{CustomExpectation, MetricsExpectation, OutputExpectation, ResponseExpectation};
use crate::lifecycle::{LifecycleAction, LifecycleOp};
use crate::request::RequestAction;
use crate::{ActionError, Result};

/// 默认动作超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// 动作构造器
///
/// 持有构造期解析所需的协作方：服务定位器、HTTP 客户端、攻击器与
/// 输出收集器工厂。构造出的动作不可变并可跨任务共享。
pub struct ActionMaker {
    locator: Arc<dyn ServiceLocator>,
    http: Arc<dyn HttpClient>,
    attacker: Arc<dyn Attacker>,
    collectors: Arc<dyn CollectorFactory>,
    default_timeout: Duration,
}

impl ActionMaker {
    pub fn new(
        locator: Arc<dyn ServiceLocator>,
        http: Arc<dyn HttpClient>,
        attacker: Arc<dyn Attacker>,
        collectors: Arc<dyn CollectorFactory>,
    ) -> Self {
        Self {
            locator,
            http,
            attacker,
            collectors,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// 设置默认超时
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// 从配置节点构造动作
    pub fn make(&self, config: &ActionConfig) -> Result<Arc<dyn Action>> {
        self.make_with_default(config, self.default_timeout)
    }

    /// 用调用方给定的默认超时构造动作
    ///
    /// parallel 把自身的有效超时作为其子动作的默认超时传入。
    fn make_with_default(
        &self,
        config: &ActionConfig,
        default_timeout: Duration,
    ) -> Result<Arc<dyn Action>> {
        match config {
            ActionConfig::Request(config) => Ok(Arc::new(RequestAction::new(
                config,
                &*self.locator,
                Arc::clone(&self.http),
                default_timeout,
            )?)),
            ActionConfig::Command(config) => Ok(Arc::new(CommandAction::new(
                config,
                &*self.locator,
                Arc::clone(&self.collectors),
                default_timeout,
            )?)),
            ActionConfig::Execute(config) => Ok(Arc::new(ExecuteAction::new(
                config,
                &*self.locator,
                Arc::clone(&self.collectors),
                default_timeout,
            )?)),
            ActionConfig::Bench(config) => Ok(Arc::new(BenchAction::new(
                config,
                &*self.locator,
                Arc::clone(&self.attacker),
                default_timeout,
            )?)),
            ActionConfig::Start(config) => Ok(Arc::new(LifecycleAction::new(
                LifecycleOp::Start,
                config,
                &*self.locator,
                default_timeout,
            )?)),
            ActionConfig::Stop(config) => Ok(Arc::new(LifecycleAction::new(
                LifecycleOp::Stop,
                config,
                &*self.locator,
                default_timeout,
            )?)),
            ActionConfig::Restart(config) => Ok(Arc::new(LifecycleAction::new(
                LifecycleOp::Restart,
                config,
                &*self.locator,
                default_timeout,
            )?)),
            ActionConfig::Reload(config) => Ok(Arc::new(LifecycleAction::new(
                LifecycleOp::Reload,
                config,
                &*self.locator,
                default_timeout,
            )?)),
            ActionConfig::Not(config) => {
                let child = self.make_with_default(&config.action, default_timeout)?;
                Ok(Arc::new(NotAction::new(
                    child,
                    effective_timeout(config.timeout, default_timeout),
                    config.when,
                )))
            }
            ActionConfig::Parallel(config) => {
                let timeout = effective_timeout(config.timeout, default_timeout);
                let children = config
                    .actions
                    .iter()
                    .map(|child| self.make_with_default(child, timeout))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(ParallelAction::new(children, timeout, config.when)))
            }
            ActionConfig::Sequential(config) => self.make_sequential(config, default_timeout),
            ActionConfig::ExpectOutput(config) => Ok(Arc::new(OutputExpectation::new(
                config,
                &*self.locator,
                default_timeout,
            )?)),
            ActionConfig::ExpectResponse(config) => Ok(Arc::new(ResponseExpectation::new(
                config,
                default_timeout,
            ))),
            ActionConfig::ExpectMetrics(config) => Ok(Arc::new(MetricsExpectation::new(
                config,
                default_timeout,
            ))),
            ActionConfig::ExpectCustom(config) => Ok(Arc::new(CustomExpectation::new(
                config,
                &*self.locator,
                default_timeout,
            )?)),
        }
    }

    /// 构造 sequential：内联动作列表与命名序列二选一
    fn make_sequential(
        &self,
        config: &SequentialConfig,
        default_timeout: Duration,
    ) -> Result<Arc<dyn Action>> {
        let inline = !config.actions.is_empty();
        let named = config.service.is_some() || config.name.is_some();
        let configs: Vec<ActionConfig> = match (inline, named) {
            (true, false) => config.actions.clone(),
            (false, true) => {
                let (service_name, sequence_name) = match (&config.service, &config.name) {
                    (Some(service), Some(name)) => (service, name),
                    _ => {
                        return Err(ActionError::Config(
                            "命名序列需要同时给出 service 与 name".to_string(),
                        ))
                    }
                };
                let service = self.locator.find(service_name)?;
                let nodes = service.server().sequence(sequence_name).ok_or_else(|| {
                    ActionError::Config(format!("服务器上没有名为 {sequence_name} 的动作序列"))
                })?;
                nodes
                    .into_iter()
                    .map(|node| {
                        serde_json::from_value(node).map_err(|e| {
                            ActionError::Config(format!("命名序列 {sequence_name} 配置无效: {e}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            (true, true) => {
                return Err(ActionError::Config(
                    "内联动作列表与命名序列只能二选一".to_string(),
                ))
            }
            (false, false) => {
                return Err(ActionError::Config(
                    "sequential 需要内联动作列表或命名序列".to_string(),
                ))
            }
        };

        let children = configs
            .iter()
            .map(|child| self.make_with_default(child, default_timeout))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(SequentialAction::new(
            children,
            effective_timeout(config.timeout, default_timeout),
            config.when,
            config.on_failure,
        )))
    }
}
