//! 运行数据存储 - 单次运行内动作间传递结果的并发 KV 存储

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("结果序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 运行数据存储
///
/// 键按约定划分命名空间（`response/<id>`、`command/<id>`、`metrics/<id>`）。
/// 每次运行创建新实例；叶子动作写入，期望动作读取；克隆共享同一底层
/// 存储，并行动作可以并发写入。已存储的值只会被整体覆盖，不会原地
/// 修改。键不存在时 [`RunData::load`] 返回 `None`，由读取方给出类型化
/// 的未找到错误。
#[derive(Debug, Clone, Default)]
pub struct RunData {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl RunData {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 存储一个结果，值先序列化为 JSON
    pub async fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }

    /// 读取结果；键不存在时返回 None
    pub async fn load(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    /// 已存储的键数量
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// 是否为空
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
