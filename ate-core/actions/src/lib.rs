//! ATE 动作执行引擎
//!
//! 测试场景的动作组合、调度与执行：多态动作模型、sequential /
//! parallel / not 组合动作的控制流与并发语义、超时与取消传播，
//! 以及贯穿单次运行、供动作间传递结果的数据存储。

pub mod action;
pub mod bench;
pub mod command;
pub mod composite;
pub mod config;
pub mod expect;
pub mod lifecycle;
pub mod maker;
pub mod reader;
pub mod request;
pub mod runner;

pub use action::{Action, Outcome};
pub use bench::BenchAction;
pub use command::{CommandAction, ExecuteAction};
pub use composite::{NotAction, ParallelAction, SequentialAction};
pub use config::{
    ActionConfig, BenchConfig, CommandConfig, CustomExpectConfig, ExecuteConfig,
    LifecycleConfig, MessageOrder, MetricOp, MetricRule, MetricsExpectConfig, NotConfig,
    OnFailure, OutputExpectConfig, ParallelConfig, RequestConfig, ResponseExpectConfig,
    Scenario, SequentialConfig, When,
};
pub use expect::{CustomExpectation, MetricsExpectation, OutputExpectation, ResponseExpectation};
pub use lifecycle::{LifecycleAction, LifecycleOp};
pub use maker::{ActionMaker, DEFAULT_TIMEOUT};
pub use reader::ChunkedReader;
pub use request::RequestAction;
pub use runner::{ActionReport, RunReport, Runner};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("不支持的命令形式: {0}")]
    UnsupportedCommand(String),

    #[error("不支持的期望种类: {0}")]
    UnsupportedExpectation(String),

    #[error("数据未找到: {0}")]
    NotFound(String),

    #[error("未知指标: {0}")]
    UnknownMetric(String),

    #[error("结果解码失败: {0}")]
    Decode(String),

    #[error("服务错误: {0}")]
    Service(#[from] ate_service::ServiceError),

    #[error("存储错误: {0}")]
    Store(#[from] ate_common::StoreError),

    #[error("HTTP 错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Context(#[from] ate_common::ContextError),

    #[error("{0}")]
    Aggregate(String),

    #[error("Sequential action failed with error: {0}")]
    SequentialFailed(Box<ActionError>),
}

pub type Result<T> = std::result::Result<T, ActionError>;
