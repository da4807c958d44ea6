//! TCP transport carrying length-prefixed RPC frames

use crate::error::{RpcStatus, TransportError};
use crate::transport::traits::{ChannelFactory, ItemStream, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::codec::{self, FrameDecoder};
use cloudlet_shared::{FrameKind, RpcFrame, RpcMethod};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::debug;

/// One framed TCP connection
struct Connection {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    async fn send(&mut self, frame: &RpcFrame) -> Result<(), RpcStatus> {
        let bytes = codec::encode(frame).map_err(|e| RpcStatus::internal(e.to_string()))?;
        self.stream
            .write_all(&bytes)
            .await
            .map_err(|e| RpcStatus::unavailable(format!("write failed: {}", e)))
    }

    async fn recv(&mut self) -> Result<RpcFrame, RpcStatus> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self
                .decoder
                .decode_next()
                .map_err(|e| RpcStatus::internal(e.to_string()))?
            {
                return Ok(frame);
            }
            let n = self
                .stream
                .read(&mut buf)
                .await
                .map_err(|e| RpcStatus::unavailable(format!("read failed: {}", e)))?;
            if n == 0 {
                return Err(RpcStatus::unavailable("connection closed by peer"));
            }
            self.decoder.extend(&buf[..n]);
        }
    }

    /// Next frame belonging to `call_id`
    async fn recv_for(&mut self, call_id: u64) -> Result<RpcFrame, RpcStatus> {
        loop {
            let frame = self.recv().await?;
            if frame.call_id == call_id {
                return Ok(frame);
            }
            debug!("[RPC] Dropping frame for stale call {}", frame.call_id);
        }
    }
}

fn status_of(frame: &RpcFrame) -> RpcStatus {
    RpcStatus::from_wire(frame.status_code, frame.status_message.clone())
}

/// Channel over a single TCP connection
pub struct TcpChannel {
    target: String,
    conn: Mutex<Option<Connection>>,
    call_id: AtomicU64,
}

impl TcpChannel {
    fn new(target: String, stream: TcpStream) -> Self {
        Self {
            target,
            conn: Mutex::new(Some(Connection::new(stream))),
            call_id: AtomicU64::new(0),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl RpcChannel for TcpChannel {
    async fn unary(
        &self,
        method: RpcMethod,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Result<Option<Vec<u8>>, RpcStatus> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| RpcStatus::unavailable("channel is shut down"))?;
        let call_id = self.next_call_id();
        let request = RpcFrame::request(call_id, method, payload, deadline.as_millis() as u64);

        let reply = timeout(deadline, async {
            conn.send(&request).await?;
            conn.recv_for(call_id).await
        })
        .await
        .map_err(|_| RpcStatus::deadline_exceeded(deadline))??;

        match reply.frame_kind() {
            FrameKind::FrameReply => Ok(reply.payload),
            FrameKind::FrameError => Err(status_of(&reply)),
            other => Err(RpcStatus::internal(format!(
                "unexpected {:?} frame for {}",
                other,
                method.path()
            ))),
        }
    }

    async fn server_stream(
        &self,
        method: RpcMethod,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Result<ItemStream, RpcStatus> {
        let started = Instant::now();
        let expires = started + deadline;
        // The stream owns the connection until it ends
        let mut conn = self
            .conn
            .lock()
            .await
            .take()
            .ok_or_else(|| RpcStatus::unavailable("channel is shut down"))?;
        let call_id = self.next_call_id();
        let request = RpcFrame::request(call_id, method, payload, deadline.as_millis() as u64);
        timeout_at(expires, conn.send(&request))
            .await
            .map_err(|_| RpcStatus::deadline_exceeded(deadline))??;

        let items = stream::unfold(Some(conn), move |state| async move {
            let mut conn = state?;
            let frame = match timeout_at(expires, conn.recv_for(call_id)).await {
                Ok(Ok(frame)) => frame,
                Ok(Err(status)) => return Some((Err(status), None)),
                Err(_) => return Some((Err(RpcStatus::deadline_exceeded(deadline)), None)),
            };
            match frame.frame_kind() {
                FrameKind::FrameStreamItem => {
                    Some((Ok(frame.payload.unwrap_or_default()), Some(conn)))
                }
                FrameKind::FrameStreamEnd => None,
                FrameKind::FrameError => Some((Err(status_of(&frame)), None)),
                other => Some((
                    Err(RpcStatus::internal(format!(
                        "unexpected {:?} frame in stream",
                        other
                    ))),
                    None,
                )),
            }
        });
        Ok(items.boxed())
    }

    async fn shutdown(&self, wait: Duration) -> Result<(), RpcStatus> {
        let Some(mut conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        match timeout(wait, conn.stream.shutdown()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RpcStatus::unavailable(format!("shutdown failed: {}", e))),
            Err(_) => Err(RpcStatus::deadline_exceeded(wait)),
        }
    }

    fn target(&self) -> String {
        self.target.clone()
    }
}

/// Opens plain TCP channels
#[derive(Debug, Clone)]
pub struct TcpChannelFactory {
    connect_timeout: Duration,
}

impl Default for TcpChannelFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TcpChannelFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ChannelFactory for TcpChannelFactory {
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn RpcChannel>, TransportError> {
        if host.is_empty() {
            return Err(TransportError::InvalidEndpoint("empty host".into()));
        }
        let addr = format!("{}:{}", host, port);
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => return Err(TransportError::ConnectTimeout { addr }),
        };
        // Frames are small and latency-bound
        let _ = stream.set_nodelay(true);
        debug!("[RPC] Channel open to {}", addr);
        Ok(Arc::new(TcpChannel::new(addr, stream)))
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection and answer its first request with `answer`
    async fn one_shot_server(
        answer: impl FnOnce(RpcFrame) -> Vec<RpcFrame> + Send + 'static,
    ) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            let request = conn.recv().await.unwrap();
            for frame in answer(request) {
                conn.send(&frame).await.unwrap();
            }
            // Hold the socket open until the client is done
            let _ = conn.recv().await;
        });
        port
    }

    #[tokio::test]
    async fn test_unary_round_trip() {
        let port = one_shot_server(|req| {
            vec![RpcFrame::reply(req.call_id, req.rpc_method(), Some(b"pong".to_vec()))]
        })
        .await;
        let channel = TcpChannelFactory::default().open("127.0.0.1", port).await.unwrap();

        let reply = channel
            .unary(RpcMethod::GetLocation, b"ping".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply, Some(b"pong".to_vec()));
        channel.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_frame_becomes_status() {
        let port = one_shot_server(|req| {
            vec![RpcFrame::error(
                req.call_id,
                req.rpc_method(),
                cloudlet_shared::StatusCode::PermissionDenied,
                "nope",
            )]
        })
        .await;
        let channel = TcpChannelFactory::default().open("127.0.0.1", port).await.unwrap();

        let err = channel
            .unary(RpcMethod::RegisterClient, vec![], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, cloudlet_shared::StatusCode::PermissionDenied);
        assert_eq!(err.message, "nope");
    }

    #[tokio::test]
    async fn test_silent_server_hits_deadline() {
        let port = one_shot_server(|_| vec![]).await;
        let channel = TcpChannelFactory::default().open("127.0.0.1", port).await.unwrap();

        let err = channel
            .unary(RpcMethod::FindCloudlet, vec![], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err.code, cloudlet_shared::StatusCode::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_server_stream_until_end() {
        let port = one_shot_server(|req| {
            let method = req.rpc_method();
            vec![
                RpcFrame::stream_item(req.call_id, method, vec![1]),
                RpcFrame::stream_item(req.call_id, method, vec![2]),
                RpcFrame::stream_end(req.call_id, method),
            ]
        })
        .await;
        let channel = TcpChannelFactory::default().open("127.0.0.1", port).await.unwrap();

        let items: Vec<_> = channel
            .server_stream(RpcMethod::GetQosPositionKpi, vec![], Duration::from_secs(1))
            .await
            .unwrap()
            .collect()
            .await;
        let items: Vec<Vec<u8>> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(items, vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = match TcpChannelFactory::default().open("127.0.0.1", port).await {
            Err(err) => err,
            Ok(_) => panic!("connected to a closed port"),
        };
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_empty_host_rejected() {
        let result = TcpChannelFactory::default().open("", 50051).await;
        assert!(matches!(result, Err(TransportError::InvalidEndpoint(_))));
    }
}
