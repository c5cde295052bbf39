//! 生命周期动作 - start/stop/restart/reload

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use ate_common::{ExecContext, RunData};
use ate_service::{Service, ServiceLocator};

use crate::action::{Action, Outcome};
use crate::config::{effective_timeout, LifecycleConfig, When};
use crate::Result;

/// 生命周期操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Start,
    Stop,
    Restart,
    Reload,
}

impl LifecycleOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Start => "start",
            LifecycleOp::Stop => "stop",
            LifecycleOp::Restart => "restart",
            LifecycleOp::Reload => "reload",
        }
    }
}

/// 生命周期动作
///
/// 目标服务在构造时解析：显式列表（单数 service 追加在 services
/// 之后），为空时回退到定位器已知的全部服务。执行按列表顺序逐个
/// 调用生命周期操作，首个错误即中止（不做部分结果聚合）。
pub struct LifecycleAction {
    op: LifecycleOp,
    services: Vec<Arc<dyn Service>>,
    timeout: Duration,
    when: When,
}

impl LifecycleAction {
    pub fn new(
        op: LifecycleOp,
        config: &LifecycleConfig,
        locator: &dyn ServiceLocator,
        default_timeout: Duration,
    ) -> Result<Self> {
        let names = config.merged_targets();
        let services = if names.is_empty() {
            locator.services()
        } else {
            names
                .iter()
                .map(|name| locator.find(name))
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(Self {
            op,
            services,
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
        })
    }

    /// 构造时解析出的目标服务
    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    async fn run(&self, ctx: &ExecContext) -> Result<bool> {
        for service in &self.services {
            info!(service = service.name(), op = self.op.as_str(), "执行生命周期操作");
            match self.op {
                LifecycleOp::Start => service.start(ctx).await?,
                LifecycleOp::Stop => service.stop(ctx).await?,
                LifecycleOp::Restart => service.restart(ctx).await?,
                LifecycleOp::Reload => service.reload(ctx).await?,
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Action for LifecycleAction {
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
