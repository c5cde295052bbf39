//! 动作契约

use std::time::Duration;

use async_trait::async_trait;

use ate_common::{ExecContext, RunData};

use crate::config::{OnFailure, When};
use crate::{ActionError, Result};

/// 单次执行的结果
///
/// `success=false` 且无错误表示受控失败（例如期望不匹配）；携带错误
/// 表示操作性失败，叶子动作此时布尔结果恒为 false。两个信号独立记录：
/// sequential 可能在布尔结果为真的同时附带子动作错误。
#[derive(Debug, Default)]
pub struct Outcome {
    /// 布尔结果
    pub success: bool,

    /// 操作性错误
    pub error: Option<ActionError>,
}

impl Outcome {
    /// 成功
    pub fn passed() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// 受控失败（无错误）
    pub fn failed() -> Self {
        Self {
            success: false,
            error: None,
        }
    }

    /// 操作性失败
    pub fn from_error(error: ActionError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    /// 由布尔结果构造
    pub fn from_bool(success: bool) -> Self {
        Self {
            success,
            error: None,
        }
    }

    /// 把内部 `Result<bool>` 形式的实现收敛为结果
    pub fn from_result(result: Result<bool>) -> Self {
        match result {
            Ok(success) => Self::from_bool(success),
            Err(error) => Self::from_error(error),
        }
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// 动作 - 测试场景中的统一工作单元
///
/// 由 maker 从配置节点构造一次，此后不可变；可被执行零或多次
/// （通常一次）。执行时必须在阻塞点感知上下文取消。
#[async_trait]
pub trait Action: Send + Sync {
    /// 在给定上下文与运行数据上执行一次
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome;

    /// 动作自身的超时时间，由组合父动作用于派生子作用域
    fn timeout(&self) -> Duration;

    /// 相对先前失败的执行条件，由 sequential 父动作消费
    fn when(&self) -> When {
        When::Always
    }

    /// 失败策略，由组合调用方消费
    fn on_failure(&self) -> OnFailure {
        OnFailure::Fail
    }
}

impl std::fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Action")
    }
}
