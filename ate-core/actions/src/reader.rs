//! 受控分块读取器
//!
//! 包装内存中的请求体，按固定块大小与块间延迟产生精确的线上分块
//! 行为，用于需要受控分块传输编码的请求体。

use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::time::sleep;

use ate_common::ExecContext;

use crate::Result;

/// 受控分块读取器
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    delay: Duration,
    ctx: ExecContext,
    started: bool,
}

impl ChunkedReader {
    /// `chunk_size` 为 0 表示不限制块大小（由调用方缓冲区决定）
    pub fn new(data: Vec<u8>, chunk_size: usize, delay: Duration, ctx: ExecContext) -> Self {
        Self {
            data,
            pos: 0,
            chunk_size,
            delay,
            ctx,
            started: false,
        }
    }

    /// 读取下一段数据到缓冲区
    ///
    /// 每次最多返回 `min(chunk_size, 剩余, buf.len())` 字节；除第一次
    /// 读取与末尾的终止读取外，读取前执行一次可取消的延迟；返回 0
    /// 表示流结束。每次调用开始时检查取消，已取消则立即失败。
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ctx.check()?;
        if self.pos >= self.data.len() {
            // 终止读取不延迟
            return Ok(0);
        }
        if self.started && self.delay > Duration::ZERO {
            self.ctx.run_until(sleep(self.delay)).await?;
        }
        self.started = true;

        let mut take = self.data.len() - self.pos;
        if self.chunk_size > 0 {
            take = take.min(self.chunk_size);
        }
        take = take.min(buf.len());
        buf[..take].copy_from_slice(&self.data[self.pos..self.pos + take]);
        self.pos += take;
        Ok(take)
    }

    /// 转换为字节流，供 HTTP 请求体使用
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<u8>>> + Send {
        stream::unfold(self, |mut reader| async move {
            let capacity = if reader.chunk_size > 0 {
                reader.chunk_size
            } else {
                8192
            };
            let mut buf = vec![0u8; capacity];
            match reader.read(&mut buf).await {
                Ok(0) => None,
                Ok(count) => {
                    buf.truncate(count);
                    Some((Ok(buf), reader))
                }
                Err(err) => {
                    // 错误后流终止
                    reader.pos = reader.data.len();
                    Some((Err(err), reader))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ate_common::ContextError;
    use futures_util::StreamExt;
    use tokio::time::Instant;

    use crate::ActionError;

    #[tokio::test]
    async fn test_chunked_reads() {
        let ctx = ExecContext::background();
        let mut reader = ChunkedReader::new(b"0123456789".to_vec(), 3, Duration::ZERO, ctx);
        let mut buf = [0u8; 16];
        let mut chunks = Vec::new();
        loop {
            let count = reader.read(&mut buf).await.unwrap();
            if count == 0 {
                break;
            }
            chunks.push(String::from_utf8_lossy(&buf[..count]).into_owned());
        }
        assert_eq!(chunks, vec!["012", "345", "678", "9"]);
        // 终止后的再次读取仍然返回 0
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_buffer_smaller_than_chunk() {
        let ctx = ExecContext::background();
        let mut reader = ChunkedReader::new(b"abcdef".to_vec(), 4, Duration::ZERO, ctx);
        let mut buf = [0u8; 2];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"ab");
    }

    #[tokio::test]
    async fn test_unlimited_chunk_size() {
        let ctx = ExecContext::background();
        let mut reader = ChunkedReader::new(b"abcdef".to_vec(), 0, Duration::ZERO, ctx);
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_canceled_before_first_read() {
        let ctx = ExecContext::background();
        ctx.cancel();
        let mut reader = ChunkedReader::new(b"0123456789".to_vec(), 3, Duration::ZERO, ctx);
        let mut buf = [0u8; 16];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, ActionError::Context(ContextError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_before_every_read_except_first_and_eof() {
        let delay = Duration::from_millis(100);
        let ctx = ExecContext::background();
        let mut reader = ChunkedReader::new(b"0123456789".to_vec(), 3, delay, ctx);
        let mut buf = [0u8; 16];

        let started = Instant::now();
        let mut reads = 0usize;
        while reader.read(&mut buf).await.unwrap() > 0 {
            reads += 1;
        }
        assert_eq!(reads, 4);
        // 4 个数据块只在第 2、3、4 次读取前延迟；终止读取不延迟
        assert_eq!(started.elapsed(), delay * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_aborts_read() {
        let ctx = ExecContext::background();
        let scope = ctx.child(Duration::from_millis(50));
        let mut reader = ChunkedReader::new(
            b"0123456789".to_vec(),
            3,
            Duration::from_secs(10),
            scope.ctx().clone(),
        );
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 3);

        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::Context(ContextError::DeadlineExceeded)
        ));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let ctx = ExecContext::background();
        let reader = ChunkedReader::new(b"0123456789".to_vec(), 4, Duration::ZERO, ctx);
        let chunks: Vec<Vec<u8>> = reader
            .into_stream()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]);
    }
}
