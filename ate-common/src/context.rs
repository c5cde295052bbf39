//! 执行上下文 - 可取消、带截止时间的执行作用域

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 上下文结束的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("执行已取消")]
    Canceled,

    #[error("执行超时")]
    DeadlineExceeded,
}

/// 执行上下文
///
/// 每次动作调用都从父作用域派生一个子上下文，携带取消令牌、截止时间
/// 与 dry-run 标志。取消是协作式的：动作在阻塞点（I/O、睡眠、等待
/// 子动作）通过 [`ExecContext::run_until`] 或 [`ExecContext::done`]
/// 感知取消；父上下文取消后自动传播到所有派生的子上下文。
#[derive(Debug, Clone)]
pub struct ExecContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    dry_run: bool,
}

impl ExecContext {
    /// 创建顶层上下文（无截止时间）
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
            dry_run: false,
        }
    }

    /// 设置 dry-run 标志
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 是否处于 dry-run 模式
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// 派生带超时的子作用域
    ///
    /// 子作用域的截止时间取父截止时间与 `now + timeout` 中较早者；
    /// `timeout` 为零时仅继承父截止时间。返回的 [`Scope`] 在 drop 时
    /// 取消派生的令牌，保证子动作的所有退出路径都释放作用域。
    pub fn child(&self, timeout: Duration) -> Scope {
        let deadline = if timeout.is_zero() {
            self.deadline
        } else {
            let derived = Instant::now() + timeout;
            Some(self.deadline.map_or(derived, |parent| parent.min(derived)))
        };
        Scope {
            ctx: ExecContext {
                cancel: self.cancel.child_token(),
                deadline,
                dry_run: self.dry_run,
            },
        }
    }

    /// 取消此上下文（连同所有派生的子上下文）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 是否已经结束（被取消或超过截止时间）
    pub fn is_done(&self) -> bool {
        self.error().is_some()
    }

    /// 结束原因；尚未结束时返回 None
    pub fn error(&self) -> Option<ContextError> {
        if self.cancel.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// 阻塞点检查：已结束时立即返回错误
    pub fn check(&self) -> Result<(), ContextError> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// 等待上下文结束（取消或截止时间到达）
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => ContextError::Canceled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                ContextError::Canceled
            }
        }
    }

    /// 在上下文约束下运行一个 future
    ///
    /// 上下文已结束时立即失败，不会轮询 `fut`。
    pub async fn run_until<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: std::future::Future,
    {
        self.check()?;
        tokio::select! {
            out = fut => Ok(out),
            err = self.done() => Err(err),
        }
    }
}

/// 派生作用域守卫
///
/// drop 时取消所持有的派生令牌；子动作执行返回后无论结果如何，
/// 作用域资源都会被释放。
#[derive(Debug)]
pub struct Scope {
    ctx: ExecContext,
}

impl Scope {
    /// 作用域内的执行上下文
    pub fn ctx(&self) -> &ExecContext {
        &self.ctx
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.ctx.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_done() {
        let ctx = ExecContext::background();
        assert!(!ctx.is_done());
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.error(), None);
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_child() {
        let ctx = ExecContext::background();
        let scope = ctx.child(Duration::from_secs(60));
        let child = scope.ctx().clone();
        assert!(!child.is_done());

        ctx.cancel();
        assert_eq!(child.error(), Some(ContextError::Canceled));
    }

    #[tokio::test]
    async fn test_scope_drop_cancels_child_not_parent() {
        let ctx = ExecContext::background();
        let child = {
            let scope = ctx.child(Duration::from_secs(60));
            scope.ctx().clone()
        };
        assert_eq!(child.error(), Some(ContextError::Canceled));
        assert!(!ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_deadline() {
        let ctx = ExecContext::background();
        let scope = ctx.child(Duration::from_millis(100));
        assert!(!scope.ctx().is_done());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(scope.ctx().error(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_inherits_earlier_parent_deadline() {
        let ctx = ExecContext::background();
        let outer = ctx.child(Duration::from_millis(100));
        // 子作用域申请了更长的超时，但父截止时间更早
        let inner = outer.ctx().child(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(inner.ctx().error(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_until_fails_immediately_when_done() {
        let ctx = ExecContext::background();
        ctx.cancel();

        let result: Result<(), ContextError> =
            ctx.run_until(async { panic!("不应被轮询") }).await;
        assert_eq!(result.unwrap_err(), ContextError::Canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_deadline_aborts_future() {
        let ctx = ExecContext::background();
        let scope = ctx.child(Duration::from_millis(50));

        let result = scope
            .ctx()
            .run_until(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(result.unwrap_err(), ContextError::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_dry_run_inherited_by_child() {
        let ctx = ExecContext::background().with_dry_run(true);
        let scope = ctx.child(Duration::from_secs(1));
        assert!(scope.ctx().dry_run());
    }
}
