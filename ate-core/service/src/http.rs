//! HTTP 客户端契约与默认实现

use async_trait::async_trait;

use crate::Result;

/// 注入式 HTTP 客户端
///
/// 请求动作通过此接口发送请求，传输细节由实现承担。
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// 发送请求并返回响应
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response>;
}

/// 基于 reqwest 的默认客户端
#[derive(Debug, Clone, Default)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 复用已配置的 reqwest 客户端
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        Ok(self.client.execute(request).await?)
    }
}
