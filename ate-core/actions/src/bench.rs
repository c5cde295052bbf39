//! 压测动作

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use ate_common::{AttackTarget, ExecContext, Metrics, RunData};
use ate_service::{Attacker, Service, ServiceLocator};

use crate::action::{Action, Outcome};
use crate::config::{BenchConfig, When};
use crate::{ActionError, Result};

/// 超时未设置时在时长之上附加的余量
const TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// 时长未设置时从超时中扣除的余量
const DURATION_MARGIN: Duration = Duration::from_millis(100);

/// 压测动作
///
/// 以固定速率驱动注入的攻击器；后台任务把攻击结果聚合进指标，
/// 结束后把快照写入 `metrics/<id>`。调用方在三路等待上收敛：
/// 上下文结束（放弃攻击）、聚合/存储错误、正常完成。
pub struct BenchAction {
    id: Option<String>,
    service: Arc<dyn Service>,
    method: String,
    path: String,
    rate: u64,
    duration: Duration,
    attacker: Arc<dyn Attacker>,
    timeout: Duration,
    when: When,
}

impl BenchAction {
    pub fn new(
        config: &BenchConfig,
        locator: &dyn ServiceLocator,
        attacker: Arc<dyn Attacker>,
        default_timeout: Duration,
    ) -> Result<Self> {
        let service = locator.find(&config.service)?;
        let (timeout, duration) = derive_windows(config.timeout, config.duration, default_timeout);
        Ok(Self {
            id: config.id.clone(),
            service,
            method: config.method.clone(),
            path: config.path.clone(),
            rate: config.rate,
            duration,
            attacker,
            timeout,
            when: config.when,
        })
    }

    /// 推导出的压测时长
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// 超时与时长互推：超时未设置时取 `max(duration + 5s, default)`；
/// 时长未设置时取 `timeout - 100ms`，下溢时取 `timeout` 本身。
fn derive_windows(
    timeout: Option<u64>,
    duration: Option<u64>,
    default_timeout: Duration,
) -> (Duration, Duration) {
    let configured_duration = duration.filter(|d| *d > 0).map(Duration::from_secs);
    let timeout = match timeout.filter(|t| *t > 0).map(Duration::from_secs) {
        Some(timeout) => timeout,
        None => (configured_duration.unwrap_or_default() + TIMEOUT_MARGIN).max(default_timeout),
    };
    let duration = match configured_duration {
        Some(duration) => duration,
        None if timeout > DURATION_MARGIN => timeout - DURATION_MARGIN,
        None => timeout,
    };
    (timeout, duration)
}

#[async_trait]
impl Action for BenchAction {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        let url = match self.service.public_url(&self.path) {
            Ok(url) => url,
            Err(err) => return Outcome::from_error(err.into()),
        };
        let label = self
            .id
            .clone()
            .unwrap_or_else(|| self.service.name().to_string());
        let target = AttackTarget {
            method: self.method.clone(),
            url,
        };
        debug!(
            label = %label,
            rate = self.rate,
            duration_secs = self.duration.as_secs_f64(),
            "开始压测"
        );
        let mut results = self.attacker.attack(target, self.rate, self.duration, &label);

        let (err_tx, mut err_rx) = mpsc::channel::<ActionError>(1);
        let data = data.clone();
        let key = self.id.as_ref().map(|id| format!("metrics/{id}"));
        let drain = tokio::spawn(async move {
            let mut metrics = Metrics::new();
            while let Some(result) = results.recv().await {
                metrics.add(&result);
            }
            metrics.close();
            if let Some(key) = key {
                if let Err(err) = data.store(&key, &metrics.snapshot()).await {
                    let _ = err_tx.send(err.into()).await;
                }
            }
        });

        tokio::select! {
            err = ctx.done() => {
                // 放弃攻击：聚合任务继续在后台排空结果
                warn!("压测被中断");
                Outcome::from_error(err.into())
            }
            Some(err) = err_rx.recv() => Outcome::from_error(err),
            join = drain => {
                if let Err(err) = join {
                    return Outcome::from_error(ActionError::Aggregate(format!(
                        "压测聚合任务异常结束: {err}"
                    )));
                }
                // 聚合任务先于错误分支完成时补查一次错误通道
                match err_rx.try_recv() {
                    Ok(err) => Outcome::from_error(err),
                    Err(_) => Outcome::passed(),
                }
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_secs(30);

    #[test]
    fn test_both_configured() {
        let (timeout, duration) = derive_windows(Some(60), Some(10), DEFAULT);
        assert_eq!(timeout, Duration::from_secs(60));
        assert_eq!(duration, Duration::from_secs(10));
    }

    #[test]
    fn test_timeout_derived_from_duration() {
        // duration + 5s 小于默认值时取默认值
        let (timeout, duration) = derive_windows(None, Some(10), DEFAULT);
        assert_eq!(timeout, DEFAULT);
        assert_eq!(duration, Duration::from_secs(10));

        // duration + 5s 大于默认值时取推导值
        let (timeout, _) = derive_windows(None, Some(40), DEFAULT);
        assert_eq!(timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_duration_derived_from_timeout() {
        let (timeout, duration) = derive_windows(Some(10), None, DEFAULT);
        assert_eq!(timeout, Duration::from_secs(10));
        assert_eq!(duration, Duration::from_secs(10) - DURATION_MARGIN);
    }

    #[test]
    fn test_both_unset() {
        let (timeout, duration) = derive_windows(None, None, DEFAULT);
        assert_eq!(timeout, DEFAULT);
        assert_eq!(duration, DEFAULT - DURATION_MARGIN);
    }

    #[test]
    fn test_zero_treated_as_unset() {
        let (timeout, duration) = derive_windows(Some(0), Some(0), DEFAULT);
        assert_eq!(timeout, DEFAULT);
        assert_eq!(duration, DEFAULT - DURATION_MARGIN);
    }
}
