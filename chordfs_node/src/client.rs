use crate::error::{ChordError, Result};
use chordfs_proto::chord::chord_client::ChordClient;
use chordfs_proto::chord::{Empty, FindSuccessorRequest, IdRequest, NodeInfo};
use chordfs_proto::{Id, NodeRef};
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

/// Outbound side of the ring RPCs. Every call opens a fresh channel bounded by
/// the configured timeout, so an unresponsive peer costs at most one timeout.
#[derive(Debug, Clone)]
pub struct RingClient {
    timeout: Duration,
}

impl RingClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn find_successor(&self, addr: &str, id: Id, hops: u32) -> Result<NodeRef> {
        let mut client = self.connect(addr).await?;
        let request = Request::new(FindSuccessorRequest {
            id: id.to_vec(),
            hops,
        });
        let response = client
            .find_successor(request)
            .await
            .map_err(|status| rpc_error(addr, status))?;
        Ok(response.into_inner().into())
    }

    pub async fn closest_preceding_node(&self, addr: &str, id: Id) -> Result<NodeRef> {
        let mut client = self.connect(addr).await?;
        let request = Request::new(IdRequest { id: id.to_vec() });
        let response = client
            .closest_preceding_node(request)
            .await
            .map_err(|status| rpc_error(addr, status))?;
        Ok(response.into_inner().into())
    }

    pub async fn get_predecessor(&self, addr: &str) -> Result<Option<NodeRef>> {
        let mut client = self.connect(addr).await?;
        let response = client
            .get_predecessor(Request::new(Empty {}))
            .await
            .map_err(|status| rpc_error(addr, status))?;
        Ok(response.into_inner().predecessor.map(NodeRef::from))
    }

    /// Offers `me` as predecessor; returns whether it was accepted together with
    /// the peer's successor list.
    pub async fn notify(&self, addr: &str, me: &NodeRef) -> Result<(bool, Vec<NodeRef>)> {
        let mut client = self.connect(addr).await?;
        let response = client
            .notify(Request::new(NodeInfo::from(me)))
            .await
            .map_err(|status| rpc_error(addr, status))?
            .into_inner();
        let successors = response.successors.into_iter().map(NodeRef::from).collect();
        Ok((response.accepted, successors))
    }

    pub async fn get_successor_list(&self, addr: &str) -> Result<Vec<NodeRef>> {
        let mut client = self.connect(addr).await?;
        let response = client
            .get_successor_list(Request::new(Empty {}))
            .await
            .map_err(|status| rpc_error(addr, status))?;
        Ok(response
            .into_inner()
            .successors
            .into_iter()
            .map(NodeRef::from)
            .collect())
    }

    pub async fn ping(&self, addr: &str) -> Result<bool> {
        let mut client = self.connect(addr).await?;
        let response = client
            .ping(Request::new(Empty {}))
            .await
            .map_err(|status| rpc_error(addr, status))?;
        Ok(response.into_inner().alive)
    }

    async fn connect(&self, addr: &str) -> Result<ChordClient<Channel>> {
        let endpoint = Endpoint::from_shared(format!("http://{}", addr))
            .map_err(|e| ChordError::Unreachable {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ChordError::Unreachable {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(ChordClient::new(channel))
    }
}

/// A status from the peer, including a request timeout. Only a failed connect
/// is reported as [`ChordError::Unreachable`]: a timeout may come from a stall
/// further down a forwarded chain rather than from the peer itself.
fn rpc_error(addr: &str, status: tonic::Status) -> ChordError {
    ChordError::Rpc {
        addr: addr.to_string(),
        status,
    }
}
