use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};

use crate::{cache::CachedResponse, middleware::CacheFill};

/// 响应体旁路捕获
///
/// 每个数据块原样交给客户端，同时追加到内存缓冲区。
/// 上游流正常结束且缓冲区非空时，在后台任务里写入缓存，不阻塞客户端。
/// 上游出错或客户端提前断开（流被丢弃）时不写缓存。
pub struct CaptureBody<S> {
    inner: S,
    buffer: Vec<u8>,
    fill: Option<(CacheFill, Option<String>)>,
}

impl<S> CaptureBody<S> {
    pub fn new(inner: S, fill: Option<CacheFill>, content_type: Option<String>) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            fill: fill.map(|f| (f, content_type)),
        }
    }
}

impl<S, E> Stream for CaptureBody<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        match ready!(this.inner.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                if this.fill.is_some() {
                    this.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                tracing::error!("Response copy failed: {}", e);
                this.fill = None;
                this.buffer = Vec::new();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                if let Some((fill, content_type)) = this.fill.take() {
                    let body = std::mem::take(&mut this.buffer);
                    if !body.is_empty() {
                        let entry = CachedResponse {
                            status_code: 200,
                            content_type,
                            body,
                        };
                        tokio::spawn(async move { fill.cache.store(&fill.key, entry).await });
                    }
                }
                Poll::Ready(None)
            }
        }
    }
}
