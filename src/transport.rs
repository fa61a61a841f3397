use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::node::Node;

/// Upper bound on a single frame's payload. A frame is one JSON document
/// (or the literal `OK`), so anything near this size is garbage.
pub const MAX_FRAME: usize = 64 * 1024;

/// The RPC methods peers invoke on each other.
///
/// `Leave` and `Stabilize` are part of the wire vocabulary but have no
/// server-side handler; a request carrying them is dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Locate the node responsible for an identifier.
    FindSuccessor,
    /// Locate the node preceding an identifier.
    FindPredecessor,
    /// Claim candidacy as the receiver's predecessor.
    Notify,
    /// Reserved: voluntary departure.
    Leave,
    /// Reserved: externally triggered stabilization.
    Stabilize,
}

/// One framed request: a method tag plus an opaque payload.
///
/// `FindSuccessor` and `FindPredecessor` carry the raw 20 bytes of the
/// target identifier; `Notify` carries a JSON-encoded
/// [`NodeInfo`](crate::node::NodeInfo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Which handler the receiver should route this request to.
    #[serde(rename = "Method")]
    pub method: Method,
    /// The method-specific payload.
    #[serde(rename = "Data")]
    pub data: Vec<u8>,
}

impl RpcRequest {
    /// Bundles a method tag with its payload.
    pub fn new(method: Method, data: Vec<u8>) -> RpcRequest {
        RpcRequest { method, data }
    }
}

/// Carries typed requests between peers over TCP.
///
/// Every connection serves exactly one request and one response. Frames
/// are a 4-byte big-endian length prefix followed by that many payload
/// bytes, so replies of any size survive intact.
#[derive(Debug, Clone)]
pub struct Transport {
    rpc_deadline: Duration,
}

impl Transport {
    /// Creates a transport whose outbound calls give up after `rpc_deadline`.
    pub fn new(rpc_deadline: Duration) -> Transport {
        Transport { rpc_deadline }
    }

    /// Binds a listener at the node's address and spawns the accept loop.
    /// Each accepted connection is served on its own task. Fails only if
    /// the address cannot be bound.
    pub(crate) async fn listen(&self, node: Arc<Node>) -> Result<JoinHandle<()>> {
        let listener = TcpListener::bind(node.address())
            .await
            .map_err(|e| Error::Bind {
                addr: node.address().to_string(),
                source: e,
            })?;
        info!(node_id = %node.id(), addr = %node.address(), "listening for connections");

        Ok(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let node = Arc::clone(&node);
                        tokio::spawn(serve_connection(node, stream, peer));
                    }
                    Err(e) => {
                        error!(node_id = %node.id(), error = %e, "failed to accept connection");
                    }
                }
            }
        }))
    }

    /// Dials `addr`, writes one framed request, reads one framed response
    /// and closes the connection. The whole exchange is bounded by the
    /// transport's deadline so a dead peer cannot stall the caller.
    pub async fn invoke(&self, addr: &str, req: &RpcRequest) -> Result<Vec<u8>> {
        let exchange = async {
            let mut stream = TcpStream::connect(addr).await.map_err(|e| Error::Dial {
                addr: addr.to_string(),
                source: e,
            })?;
            let payload = serde_json::to_vec(req)?;
            write_frame(&mut stream, &payload).await?;
            read_frame(&mut stream).await
        };

        match time::timeout(self.rpc_deadline, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::Deadline {
                addr: addr.to_string(),
            }),
        }
    }
}

/// Decodes one request, routes it to the node and writes the reply. Any
/// failure is logged and the connection closed without a reply; the caller
/// observes a closed stream or its deadline.
async fn serve_connection(node: Arc<Node>, mut stream: TcpStream, peer: SocketAddr) {
    let request = match read_request(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            warn!(node_id = %node.id(), %peer, error = %e, "failed to decode request");
            return;
        }
    };

    let method = request.method;
    match node.dispatch(request).await {
        Ok(reply) => {
            if let Err(e) = write_frame(&mut stream, &reply).await {
                warn!(node_id = %node.id(), %peer, ?method, error = %e, "failed to write response");
            }
        }
        Err(e) => {
            warn!(node_id = %node.id(), %peer, ?method, error = %e, "rpc handler failed");
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<RpcRequest> {
    let frame = read_frame(stream).await?;
    Ok(serde_json::from_slice(&frame)?)
}

async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| Error::FrameTooLarge {
        len: payload.len(),
        max: MAX_FRAME,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME {
        return Err(Error::FrameTooLarge {
            len,
            max: MAX_FRAME,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, b"hello ring").await.unwrap();
        let got = read_frame(&mut server).await.unwrap();
        assert_eq!(got, b"hello ring");

        // Empty payloads are legal frames.
        write_frame(&mut client, b"").await.unwrap();
        let got = read_frame(&mut server).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let header = ((MAX_FRAME + 1) as u32).to_be_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut client, &header)
            .await
            .unwrap();
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { .. }));
    }

    #[test]
    fn requests_use_the_documented_field_names() {
        let req = RpcRequest::new(Method::FindSuccessor, vec![1, 2, 3]);
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"Method":"FindSuccessor","Data":[1,2,3]}"#);

        let back: RpcRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.method, Method::FindSuccessor);
        assert_eq!(back.data, vec![1, 2, 3]);
    }
}
