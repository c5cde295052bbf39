//! ATE 服务协作方契约
//!
//! 动作引擎通过本 crate 定义的窄接口消费外部协作方：被测服务与
//! 定位器、HTTP 客户端、压测攻击器、输出收集器。服务/沙箱本身的
//! 构建、环境供给与生命周期管理由嵌入方实现，不在引擎范围内。

pub mod attack;
pub mod collector;
pub mod http;
pub mod service;

pub use attack::{Attacker, HttpAttacker};
pub use collector::{CollectorFactory, MemoryCollector, MemoryCollectorFactory, OutputCollector};
pub use http::{DefaultHttpClient, HttpClient};
pub use service::{
    ExpectationDef, Server, Service, ServiceLocator, StaticLocator, StaticServer,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("服务未找到: {0}")]
    NotFound(String),

    #[error("无法解析服务地址: {0}")]
    Url(String),

    #[error("生命周期操作失败: {0}")]
    Lifecycle(String),

    #[error("命令执行失败: {0}")]
    Exec(String),

    #[error("模板渲染失败: {0}")]
    Template(String),

    #[error("HTTP 错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Context(#[from] ate_common::ContextError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
