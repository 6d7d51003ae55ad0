//! Migration pipe protocol. Hands a live Session's state to another local
//! process over a Unix domain socket named `<name>.<pid_hex>`, keyed-XOR
//! wrapped with the pipe name as key.
//!
//! The `u32` length prefix ahead of the wrapped frame is needed because a
//! stream socket has no other way to know where a self-delimiting-once-
//! decoded frame ends before it can be decrypted (see DESIGN.md).

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use wayfarer_core::device::DEVICE_LEN;
use wayfarer_core::{CoreError, Device};
use wayfarer_transport::wrapper::XorWrapper;
use wayfarer_transport::Wrapper;

use crate::error::SessionError;

/// `kind` values.
pub const KIND_SPAWN_ONLY: u8 = 0x0;
pub const KIND_FULL_MIGRATE: u8 = 0xF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub name: String,
    pub addr: String,
    pub profile_bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationFrame {
    pub job_id: u16,
    pub kind: u8,
    pub profile_bytes: Vec<u8>,
    pub device_id: Device,
    pub proxies: Vec<ProxyDescriptor>,
}

fn need(buf: &[u8], pos: usize, n: usize) -> Result<(), CoreError> {
    if pos + n > buf.len() {
        Err(CoreError::Malformed("migration frame: truncated"))
    } else {
        Ok(())
    }
}

impl MigrationFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.job_id.to_be_bytes());
        out.push(self.kind);
        out.extend_from_slice(&(self.profile_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.profile_bytes);
        out.extend_from_slice(self.device_id.as_array());
        out.push(self.proxies.len() as u8);
        for p in &self.proxies {
            out.extend_from_slice(&(p.name.len() as u16).to_be_bytes());
            out.extend_from_slice(&(p.addr.len() as u16).to_be_bytes());
            out.extend_from_slice(p.name.as_bytes());
            out.extend_from_slice(p.addr.as_bytes());
            out.extend_from_slice(&(p.profile_bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(&p.profile_bytes);
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CoreError> {
        let mut pos = 0usize;
        need(buf, pos, 2)?;
        let job_id = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        pos += 2;

        need(buf, pos, 1)?;
        let kind = buf[pos];
        pos += 1;

        need(buf, pos, 4)?;
        let profile_len = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        need(buf, pos, profile_len)?;
        let profile_bytes = buf[pos..pos + profile_len].to_vec();
        pos += profile_len;

        need(buf, pos, DEVICE_LEN)?;
        let mut dev_bytes = [0u8; DEVICE_LEN];
        dev_bytes.copy_from_slice(&buf[pos..pos + DEVICE_LEN]);
        let device_id = Device::from_bytes(dev_bytes);
        pos += DEVICE_LEN;

        need(buf, pos, 1)?;
        let proxy_count = buf[pos];
        pos += 1;

        let mut proxies = Vec::with_capacity(proxy_count as usize);
        for _ in 0..proxy_count {
            need(buf, pos, 4)?;
            let name_len = u16::from_be_bytes(buf[pos..pos + 2].try_into().unwrap()) as usize;
            let addr_len = u16::from_be_bytes(buf[pos + 2..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            need(buf, pos, name_len + addr_len)?;
            let name = String::from_utf8_lossy(&buf[pos..pos + name_len]).into_owned();
            pos += name_len;
            let addr = String::from_utf8_lossy(&buf[pos..pos + addr_len]).into_owned();
            pos += addr_len;
            need(buf, pos, 4)?;
            let p_profile_len = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            need(buf, pos, p_profile_len)?;
            let p_profile_bytes = buf[pos..pos + p_profile_len].to_vec();
            pos += p_profile_len;
            proxies.push(ProxyDescriptor {
                name,
                addr,
                profile_bytes: p_profile_bytes,
            });
        }

        Ok(MigrationFrame {
            job_id,
            kind,
            profile_bytes,
            device_id,
            proxies,
        })
    }
}

/// `<name>.<pid_hex>`.
pub fn pipe_path(name: &str, pid: u32) -> String {
    format!("{name}.{pid:x}")
}

fn io_err(e: std::io::Error) -> SessionError {
    SessionError::Core(CoreError::Transport(e.to_string()))
}

#[cfg(unix)]
fn set_world_rw(path: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mut perms = meta.permissions();
        perms.set_mode(0o666);
        let _ = std::fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn set_world_rw(_path: &str) {}

/// Departing-process side: open the pipe, wait up to `timeout` for the
/// peer, write the frame, and wait for its `"OK"` ack.
pub async fn migrate_out(
    path: &str,
    wrapper_key: &str,
    frame: &MigrationFrame,
    timeout: Duration,
) -> Result<(), SessionError> {
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path).map_err(io_err)?;
    set_world_rw(path);

    let accepted = tokio::time::timeout(timeout, listener.accept()).await;
    let (mut stream, _) = match accepted {
        Ok(Ok(pair)) => pair,
        _ => {
            let _ = std::fs::remove_file(path);
            return Err(SessionError::MigrationTimeout(timeout));
        }
    };

    let wrapper = XorWrapper::new(wrapper_key.as_bytes().to_vec())?;
    let wrapped = wrapper.wrap(&frame.encode())?;
    let result = async {
        stream.write_all(&(wrapped.len() as u32).to_be_bytes()).await?;
        stream.write_all(&wrapped).await?;
        let mut ack = [0u8; 2];
        stream.read_exact(&mut ack).await?;
        Ok::<_, std::io::Error>(ack)
    }
    .await;

    let _ = std::fs::remove_file(path);
    let ack = result.map_err(io_err)?;
    if &ack != b"OK" {
        return Err(SessionError::MigrationMalformed("peer did not ack OK"));
    }
    Ok(())
}

/// Receiving-peer side: connect within `timeout`, read the frame, ack
/// `"OK"`.
pub async fn migrate_in(
    path: &str,
    wrapper_key: &str,
    timeout: Duration,
) -> Result<MigrationFrame, SessionError> {
    let connected = tokio::time::timeout(timeout, UnixStream::connect(path)).await;
    let mut stream = match connected {
        Ok(Ok(s)) => s,
        _ => return Err(SessionError::MigrationTimeout(timeout)),
    };

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.map_err(io_err)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut wrapped = vec![0u8; len];
    stream.read_exact(&mut wrapped).await.map_err(io_err)?;

    let wrapper = XorWrapper::new(wrapper_key.as_bytes().to_vec())?;
    let decoded = wrapper.unwrap(&wrapped)?;
    let frame = MigrationFrame::decode(&decoded)
        .map_err(|_| SessionError::MigrationMalformed("frame failed to parse"))?;

    stream.write_all(b"OK").await.map_err(io_err)?;
    Ok(frame)
}
