//! ATE 通用类型与运行期基础设施
//!
//! 此 crate 包含动作引擎各组件共享的部分：执行上下文（取消/超时作用域）、
//! 运行数据存储，以及命令、响应与压测指标的数据模型。

pub mod context;
pub mod metrics;
pub mod rundata;
pub mod types;

pub use context::{ContextError, ExecContext, Scope};
pub use metrics::{AttackResult, AttackTarget, Metrics, MetricsSnapshot};
pub use rundata::{RunData, StoreError};
pub use types::{Command, CommandOutput, Parameters, ResponseData, StreamKind};
