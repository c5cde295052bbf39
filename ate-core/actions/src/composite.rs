//! 组合动作 - not/parallel/sequential
//!
//! 控制流与并发语义所在：parallel 的扇出/扇入与错误聚合、sequential
//! 的 when 门控与错误累积、not 的结果取反。dry-run 在组合边界抑制
//! 失败结果，但从不抑制操作性错误。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use ate_common::{ExecContext, RunData};

use crate::action::{Action, Outcome};
use crate::config::{OnFailure, When};
use crate::ActionError;

/// not 组合动作
///
/// 包装唯一的子动作：子动作错误原样传播；无错误时布尔结果取反；
/// dry-run 下取反被抑制，无条件报告成功。
pub struct NotAction {
    child: Arc<dyn Action>,
    timeout: Duration,
    when: When,
}

impl NotAction {
    pub fn new(child: Arc<dyn Action>, timeout: Duration, when: When) -> Self {
        Self {
            child,
            timeout,
            when,
        }
    }
}

#[async_trait]
impl Action for NotAction {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        let outcome = {
            let scope = ctx.child(self.child.timeout());
            self.child.execute(scope.ctx(), data).await
            // 子作用域在此释放，与结果无关
        };
        if let Some(err) = outcome.error {
            return Outcome::from_error(err);
        }
        if ctx.dry_run() {
            return Outcome::passed();
        }
        Outcome::from_bool(!outcome.success)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }
}

/// parallel 组合动作
///
/// 所有子动作并发执行，每个子任务派生并保证释放自己的子作用域；
/// 操作性错误（携带子动作位置索引）与无错误的失败结果分别经两条
/// 容量等于子动作数的通道汇聚，等待全部子任务结束后统一归并。
/// 子动作副作用之间没有顺序保证。
pub struct ParallelAction {
    children: Vec<Arc<dyn Action>>,
    timeout: Duration,
    when: When,
}

impl ParallelAction {
    pub fn new(children: Vec<Arc<dyn Action>>, timeout: Duration, when: When) -> Self {
        Self {
            children,
            timeout,
            when,
        }
    }

    /// 子动作列表
    pub fn children(&self) -> &[Arc<dyn Action>] {
        &self.children
    }
}

#[async_trait]
impl Action for ParallelAction {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        let count = self.children.len();
        let (err_tx, mut err_rx) = mpsc::channel::<(usize, ActionError)>(count.max(1));
        let (fail_tx, mut fail_rx) = mpsc::channel::<usize>(count.max(1));

        let mut handles = Vec::with_capacity(count);
        for (index, child) in self.children.iter().enumerate() {
            let child = Arc::clone(child);
            let ctx = ctx.clone();
            let data = data.clone();
            let err_tx = err_tx.clone();
            let fail_tx = fail_tx.clone();
            handles.push(tokio::spawn(async move {
                let outcome = {
                    let scope = ctx.child(child.timeout());
                    child.execute(scope.ctx(), &data).await
                    // 子作用域在此释放，与结果无关
                };
                // 通道容量等于子动作数，发送不会阻塞
                if let Some(err) = outcome.error {
                    let _ = err_tx.send((index, err)).await;
                } else if !outcome.success {
                    let _ = fail_tx.send(index).await;
                }
            }));
        }
        drop(err_tx);
        drop(fail_tx);

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "并行子任务异常结束");
            }
        }

        let mut errors = Vec::new();
        while let Ok(entry) = err_rx.try_recv() {
            errors.push(entry);
        }
        let mut failed = Vec::new();
        while let Ok(index) = fail_rx.try_recv() {
            failed.push(index);
        }

        if !errors.is_empty() {
            return Outcome::from_error(aggregate_errors(errors));
        }
        if !failed.is_empty() {
            debug!(?failed, "部分并行子动作未成功");
            if ctx.dry_run() {
                return Outcome::passed();
            }
            return Outcome::failed();
        }
        Outcome::passed()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }
}

/// 归并并行子动作的错误；消息陈述失败的动作数量
fn aggregate_errors(errors: Vec<(usize, ActionError)>) -> ActionError {
    let noun = if errors.len() == 1 { "action" } else { "actions" };
    let details = errors
        .iter()
        .map(|(index, err)| format!("action {index}: {err}"))
        .collect::<Vec<_>>()
        .join("; ");
    ActionError::Aggregate(format!("{} {} failed: {}", errors.len(), noun, details))
}

/// sequential 组合动作
///
/// 子动作严格按序执行；每个子动作执行前用累计失败数求值其 when
/// 条件；子动作的作用域在该子动作完成后立即释放；子动作错误被记录
/// （后者覆盖前者）但不中断循环。布尔结果与错误相互独立：循环结束
/// 后布尔结果只取决于失败计数，错误单独包装后一并返回。
pub struct SequentialAction {
    children: Vec<Arc<dyn Action>>,
    timeout: Duration,
    when: When,
    on_failure: OnFailure,
}

impl SequentialAction {
    pub fn new(
        children: Vec<Arc<dyn Action>>,
        timeout: Duration,
        when: When,
        on_failure: OnFailure,
    ) -> Self {
        Self {
            children,
            timeout,
            when,
            on_failure,
        }
    }
}

#[async_trait]
impl Action for SequentialAction {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        let mut failed_count = 0usize;
        let mut last_error: Option<ActionError> = None;

        for (index, child) in self.children.iter().enumerate() {
            let runnable = match child.when() {
                When::Always => true,
                When::OnSuccess => failed_count == 0,
                When::OnFailure => failed_count > 0,
            };
            if !runnable {
                debug!(index, condition = ?child.when(), "跳过子动作");
                continue;
            }

            let outcome = {
                let scope = ctx.child(child.timeout());
                child.execute(scope.ctx(), data).await
                // 子作用域随此块释放，不等循环结束
            };
            if let Some(err) = outcome.error {
                warn!(index, error = %err, "子动作执行出错");
                last_error = Some(err);
            }
            if !outcome.success {
                failed_count += 1;
            }
        }

        if ctx.dry_run() {
            return Outcome::passed();
        }
        Outcome {
            success: failed_count == 0,
            error: last_error.map(|err| ActionError::SequentialFailed(Box::new(err))),
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }

    fn on_failure(&self) -> OnFailure {
        self.on_failure
    }
}
