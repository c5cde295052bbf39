//! HTTP 请求动作

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Body, Method, Request, Url};
use tracing::debug;

use ate_common::{ExecContext, ResponseData, RunData};
use ate_service::{HttpClient, Service, ServiceLocator};

use crate::action::{Action, Outcome};
use crate::config::{effective_timeout, OnFailure, RequestConfig, When};
use crate::reader::ChunkedReader;
use crate::{ActionError, Result};

/// 请求动作
///
/// 解析服务公开 URL，通过注入的 HTTP 客户端发送请求，并把响应快照
/// 写入 `response/<id>`。URL 解析、请求构造、传输、响应体读取与存储
/// 的任何失败都是操作性失败。
pub struct RequestAction {
    id: Option<String>,
    service: Arc<dyn Service>,
    method: Method,
    path: String,
    headers: HashMap<String, String>,
    body: Option<String>,
    chunk_size: usize,
    chunk_delay: Duration,
    encode_path: bool,
    http: Arc<dyn HttpClient>,
    timeout: Duration,
    when: When,
    on_failure: OnFailure,
}

impl RequestAction {
    pub fn new(
        config: &RequestConfig,
        locator: &dyn ServiceLocator,
        http: Arc<dyn HttpClient>,
        default_timeout: Duration,
    ) -> Result<Self> {
        let service = locator.find(&config.service)?;
        let method = Method::from_bytes(config.method.as_bytes())
            .map_err(|_| ActionError::Config(format!("无效的 HTTP 方法: {}", config.method)))?;
        Ok(Self {
            id: config.id.clone(),
            service,
            method,
            path: config.path.clone(),
            headers: config.headers.clone(),
            body: config.body.clone(),
            chunk_size: config.chunk_size.unwrap_or(0),
            chunk_delay: Duration::from_millis(config.chunk_delay_ms.unwrap_or(0)),
            encode_path: config.encode_path,
            http,
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
            on_failure: config.on_failure,
        })
    }

    /// 构造请求
    ///
    /// `encode_path=false` 时配置路径被视作已编码文本：URL 由服务地址
    /// 与原始路径拼接后只解析一次，其中的 %XX 序列不会被二次转义。
    /// `encode_path=true` 时路径作为相对引用参与标准的 URL 归并。
    fn build_request(&self, ctx: &ExecContext) -> Result<Request> {
        let url = if self.encode_path {
            let base = self.service.public_url("/")?;
            let base = Url::parse(&base)
                .map_err(|e| ActionError::Config(format!("无法解析服务地址 {base}: {e}")))?;
            base.join(&self.path)
                .map_err(|e| ActionError::Config(format!("无法归并路径 {}: {e}", self.path)))?
        } else {
            let raw = self.service.public_url(&self.path)?;
            Url::parse(&raw)
                .map_err(|e| ActionError::Config(format!("无法解析目标 URL {raw}: {e}")))?
        };

        let mut request = Request::new(self.method.clone(), url);
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ActionError::Config(format!("无效的请求头名 {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ActionError::Config(format!("无效的请求头值: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        if let Some(body) = &self.body {
            let body = if self.chunk_size > 0 || self.chunk_delay > Duration::ZERO {
                let reader = ChunkedReader::new(
                    body.clone().into_bytes(),
                    self.chunk_size,
                    self.chunk_delay,
                    ctx.clone(),
                );
                Body::wrap_stream(reader.into_stream())
            } else {
                Body::from(body.clone())
            };
            *request.body_mut() = Some(body);
        }
        Ok(request)
    }

    async fn run(&self, ctx: &ExecContext, data: &RunData) -> Result<bool> {
        let request = self.build_request(ctx)?;
        debug!(method = %self.method, url = %request.url(), "发送请求");

        let response = ctx.run_until(self.http.execute(request)).await??;
        let status = response.status();
        let proto = format!("{:?}", response.version());
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        // 上下文已结束时立即失败，不会阻塞在响应体读取上
        let body = ctx.run_until(response.bytes()).await??;

        let snapshot = ResponseData {
            status: match status.canonical_reason() {
                Some(reason) => format!("{} {}", status.as_u16(), reason),
                None => status.as_u16().to_string(),
            },
            status_code: status.as_u16(),
            proto,
            body: String::from_utf8_lossy(&body).into_owned(),
            headers,
        };
        if let Some(id) = &self.id {
            data.store(&format!("response/{id}"), &snapshot).await?;
        }
        Ok(true)
    }
}

#[async_trait]
impl Action for RequestAction {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        Outcome::from_result(self.run(ctx, data).await)
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
