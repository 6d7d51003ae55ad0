//! Reference TCP transport. Frames are length-prefixed: a `u32` big-endian
//! byte count followed by that many bytes — the framing layer beneath the
//! wrapper/transform stage.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wayfarer_core::CoreError;

use crate::traits::{Conn, Listener, Transport};

/// Frames above this size are rejected rather than allocated for, guarding
/// against a garbled or hostile length prefix.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

pub struct TcpConn {
    stream: TcpStream,
}

impl TcpConn {
    pub fn new(stream: TcpStream) -> Self {
        TcpConn { stream }
    }
}

#[async_trait]
impl Conn for TcpConn {
    async fn read_frame(&mut self) -> Result<Vec<u8>, CoreError> {
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            return Err(CoreError::Limit("tcp frame exceeds max length"));
        }
        let mut buf = vec![0u8; len as usize];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(buf)
    }

    async fn write_frame(&mut self, data: &[u8]) -> Result<(), CoreError> {
        if data.len() as u64 > MAX_FRAME_LEN as u64 {
            return Err(CoreError::Limit("tcp frame exceeds max length"));
        }
        self.stream
            .write_all(&(data.len() as u32).to_be_bytes())
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        self.stream
            .write_all(data)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        self.stream
            .flush()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), CoreError> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))
    }
}

pub struct TcpListenerWrap {
    inner: TcpListener,
}

#[async_trait]
impl Listener for TcpListenerWrap {
    async fn accept(&mut self) -> Result<Box<dyn Conn>, CoreError> {
        let (stream, _addr) = self
            .inner
            .accept()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(Box::new(TcpConn::new(stream)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, host_addr: &str) -> Result<Box<dyn Conn>, CoreError> {
        let stream = TcpStream::connect(host_addr)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(Box::new(TcpConn::new(stream)))
    }

    async fn listen(&self, bind_addr: &str) -> Result<Box<dyn Listener>, CoreError> {
        let inner = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(Box::new(TcpListenerWrap { inner }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_frame_over_loopback() {
        let raw_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = raw_listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = raw_listener.accept().await.unwrap();
            let mut conn = TcpConn::new(stream);
            let frame = conn.read_frame().await.unwrap();
            conn.write_frame(&frame).await.unwrap();
        });

        let transport = TcpTransport;
        let mut client = transport.connect(&addr.to_string()).await.unwrap();
        client.write_frame(b"ping").await.unwrap();
        let echoed = client.read_frame().await.unwrap();
        assert_eq!(echoed, b"ping");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn oversize_frame_is_rejected() {
        let raw_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = raw_listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = raw_listener.accept().await.unwrap();
            let _ = stream
                .write_all(&(MAX_FRAME_LEN + 1).to_be_bytes())
                .await;
        });
        let transport = TcpTransport;
        let mut client = transport.connect(&addr.to_string()).await.unwrap();
        assert!(matches!(client.read_frame().await, Err(CoreError::Limit(_))));
        server.await.unwrap();
    }
}
