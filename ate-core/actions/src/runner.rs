//! 场景运行器
//!
//! 为一次运行创建全新的数据存储，在后台上下文下按序执行根动作并
//! 汇总执行报告。

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use ate_common::{ExecContext, RunData};

use crate::action::Action;
use crate::config::{OnFailure, Scenario};
use crate::maker::ActionMaker;
use crate::Result;

/// 单个根动作的执行报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// 根动作在场景中的序号
    pub index: usize,

    /// 布尔结果
    pub success: bool,

    /// 操作性错误文本
    #[serde(default)]
    pub error: Option<String>,

    /// 执行耗时（毫秒）
    pub duration_ms: u64,
}

/// 一次场景运行的报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// 运行 ID
    pub id: String,

    /// 场景名称
    pub scenario: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// 全部根动作是否成功
    pub passed: bool,

    /// 开始时间
    pub started_at: DateTime<Utc>,

    /// 总耗时（毫秒）
    pub duration_ms: u64,

    /// 各根动作的报告
    pub actions: Vec<ActionReport>,
}

/// 场景运行器
pub struct Runner {
    maker: ActionMaker,
    dry_run: bool,
}

impl Runner {
    pub fn new(maker: ActionMaker) -> Self {
        Self {
            maker,
            dry_run: false,
        }
    }

    /// 启用 dry-run：仍然执行真实操作，但组合边界不产生失败结果
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 执行场景
    ///
    /// 每次运行创建全新的数据存储；根动作按序执行，各自获得派生的
    /// 超时作用域。根动作失败时，失败策略为 skip 的继续执行后续
    /// 动作，为 fail 的终止本次运行。
    pub async fn run(&self, scenario: &Scenario) -> Result<RunReport> {
        info!(scenario = %scenario.name, dry_run = self.dry_run, "开始执行场景");
        let started_at = Utc::now();
        let started = Instant::now();
        let data = RunData::new();
        let ctx = ExecContext::background().with_dry_run(self.dry_run);

        let mut reports = Vec::with_capacity(scenario.actions.len());
        let mut passed = true;
        for (index, config) in scenario.actions.iter().enumerate() {
            let action = self.maker.make(config)?;
            let action_started = Instant::now();
            let outcome = {
                let scope = ctx.child(action.timeout());
                action.execute(scope.ctx(), &data).await
            };
            let success = outcome.success;
            reports.push(ActionReport {
                index,
                success,
                error: outcome.error.as_ref().map(|err| err.to_string()),
                duration_ms: action_started.elapsed().as_millis() as u64,
            });
            if !success {
                passed = false;
                error!(index, "根动作失败");
                if action.on_failure() == OnFailure::Fail {
                    break;
                }
            }
        }

        let report = RunReport {
            id: Uuid::new_v4().to_string(),
            scenario: scenario.name.clone(),
            description: scenario.description.clone(),
            tags: scenario.tags.clone(),
            passed,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            actions: reports,
        };
        info!(
            scenario = %scenario.name,
            passed = report.passed,
            actions = report.actions.len(),
            "场景执行完成"
        );
        Ok(report)
    }
}
