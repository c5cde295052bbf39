//! 压测攻击器契约与默认实现

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

use ate_common::{AttackResult, AttackTarget};

/// 压测攻击器
///
/// 以固定速率对目标发起请求，结果样本写入返回的通道；攻击持续
/// `duration` 后通道关闭。调用方放弃接收即视为放弃攻击。
pub trait Attacker: Send + Sync {
    fn attack(
        &self,
        target: AttackTarget,
        rate: u64,
        duration: Duration,
        label: &str,
    ) -> mpsc::Receiver<AttackResult>;
}

/// 基于 reqwest 的默认攻击器
///
/// 客户端在攻击循环外复用连接池；每个节拍派生一个请求任务，
/// 避免慢响应拖慢发压节奏。
#[derive(Debug, Clone, Default)]
pub struct HttpAttacker {
    client: reqwest::Client,
}

impl HttpAttacker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Attacker for HttpAttacker {
    fn attack(
        &self,
        target: AttackTarget,
        rate: u64,
        duration: Duration,
        label: &str,
    ) -> mpsc::Receiver<AttackResult> {
        let rate = rate.max(1);
        let (tx, rx) = mpsc::channel(rate as usize);
        let client = self.client.clone();
        let label = label.to_string();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs_f64(1.0 / rate as f64));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let deadline = Instant::now() + duration;
            let mut workers = Vec::new();

            loop {
                ticker.tick().await;
                if Instant::now() >= deadline || tx.is_closed() {
                    break;
                }
                let client = client.clone();
                let tx = tx.clone();
                let target = target.clone();
                workers.push(tokio::spawn(async move {
                    let result = shoot(&client, &target).await;
                    // 接收方已放弃时静默退出
                    let _ = tx.send(result).await;
                }));
            }

            for worker in workers {
                let _ = worker.await;
            }
            debug!(label = %label, "攻击结束");
        });

        rx
    }
}

/// 发出单次请求并采样结果
async fn shoot(client: &reqwest::Client, target: &AttackTarget) -> AttackResult {
    let method = reqwest::Method::from_bytes(target.method.as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let started = Instant::now();
    match client.request(method, &target.url).send().await {
        Ok(response) => {
            let status_code = response.status().as_u16();
            match response.bytes().await {
                Ok(body) => AttackResult {
                    status_code,
                    latency: started.elapsed(),
                    bytes_in: body.len() as u64,
                    bytes_out: 0,
                    error: None,
                },
                Err(err) => AttackResult {
                    status_code,
                    latency: started.elapsed(),
                    bytes_in: 0,
                    bytes_out: 0,
                    error: Some(err.to_string()),
                },
            }
        }
        Err(err) => AttackResult {
            status_code: 0,
            latency: started.elapsed(),
            bytes_in: 0,
            bytes_out: 0,
            error: Some(err.to_string()),
        },
    }
}
