//! Bulk byte transfer between nodes.
//!
//! The ring only decides *where* a blob lives; moving the bytes goes through
//! [`FileTransfer`]. The production implementation is a separate gRPC service
//! bound to each node's transfer address, optionally wrapped in TLS. A peer's
//! certificate travels inside its [`NodeRef`], so a client trusts exactly the
//! certificate the ring handed it.

use crate::constants::MAX_FILE_BYTES;
use crate::error::{ChordError, Result};
use crate::local_store::LocalStore;
use async_trait::async_trait;
use chordfs_proto::chord::transfer_client::TransferClient;
use chordfs_proto::chord::transfer_server::Transfer;
use chordfs_proto::chord::{Empty, FetchReply, FetchRequest, SendRequest};
use chordfs_proto::{Id, NodeRef};
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{
    Certificate, Channel, ClientTlsConfig, Endpoint, Identity, ServerTlsConfig,
};
use tonic::{Request, Response, Status};

#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn send(&self, dest: &NodeRef, key: Id, data: Vec<u8>) -> Result<()>;
    async fn fetch(&self, dest: &NodeRef, key: Id) -> Result<Vec<u8>>;
}

/// Certificate and private key of this node's transfer endpoint.
#[derive(Clone)]
pub struct TlsMaterial {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

impl TlsMaterial {
    pub fn load(cert: &Path, key: &Path) -> Result<Self> {
        let cert_pem = std::fs::read(cert)
            .map_err(|e| ChordError::Tls(format!("cannot read {}: {}", cert.display(), e)))?;
        let key_pem = std::fs::read(key)
            .map_err(|e| ChordError::Tls(format!("cannot read {}: {}", key.display(), e)))?;
        Ok(Self { cert_pem, key_pem })
    }

    pub fn server_config(&self) -> ServerTlsConfig {
        ServerTlsConfig::new().identity(Identity::from_pem(&self.cert_pem, &self.key_pem))
    }
}

#[derive(Debug, Clone)]
pub struct GrpcTransfer {
    timeout: Duration,
}

impl GrpcTransfer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn connect(&self, dest: &NodeRef) -> Result<TransferClient<Channel>> {
        let addr = dest.transfer_address();
        let unreachable = |e: tonic::transport::Error| ChordError::Unreachable {
            addr: addr.to_string(),
            reason: e.to_string(),
        };

        let endpoint = if dest.public_key().is_empty() {
            Endpoint::from_shared(format!("http://{}", addr)).map_err(unreachable)?
        } else {
            let domain = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
            let tls = ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(dest.public_key()))
                .domain_name(domain);
            Endpoint::from_shared(format!("https://{}", addr))
                .map_err(unreachable)?
                .tls_config(tls)
                .map_err(|e| ChordError::Tls(e.to_string()))?
        };

        let channel = endpoint
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect()
            .await
            .map_err(unreachable)?;
        Ok(TransferClient::new(channel)
            .max_decoding_message_size(MAX_FILE_BYTES)
            .max_encoding_message_size(MAX_FILE_BYTES))
    }
}

#[async_trait]
impl FileTransfer for GrpcTransfer {
    async fn send(&self, dest: &NodeRef, key: Id, data: Vec<u8>) -> Result<()> {
        let mut client = self.connect(dest).await?;
        client
            .send(Request::new(SendRequest {
                key: key.to_vec(),
                data,
            }))
            .await
            .map_err(|status| ChordError::Rpc {
                addr: dest.transfer_address().to_string(),
                status,
            })?;
        Ok(())
    }

    async fn fetch(&self, dest: &NodeRef, key: Id) -> Result<Vec<u8>> {
        let mut client = self.connect(dest).await?;
        let response = client
            .fetch(Request::new(FetchRequest { key: key.to_vec() }))
            .await
            .map_err(|status| ChordError::Rpc {
                addr: dest.transfer_address().to_string(),
                status,
            })?;
        Ok(response.into_inner().data)
    }
}

/// Inbound side: writes received blobs into, and serves them from, the local store.
pub struct TransferService {
    store: Arc<LocalStore>,
}

impl TransferService {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl Transfer for TransferService {
    async fn send(
        &self,
        request: Request<SendRequest>,
    ) -> std::result::Result<Response<Empty>, Status> {
        let req = request.into_inner();
        let key = Id::try_from(req.key.as_slice()).map_err(ChordError::from)?;
        debug!("Received {} bytes for key {}", req.data.len(), key);
        self.store.write(&key, &req.data).await?;
        Ok(Response::new(Empty {}))
    }

    async fn fetch(
        &self,
        request: Request<FetchRequest>,
    ) -> std::result::Result<Response<FetchReply>, Status> {
        let req = request.into_inner();
        let key = Id::try_from(req.key.as_slice()).map_err(ChordError::from)?;
        let data = self.store.read(&key).await?;
        Ok(Response::new(FetchReply { data }))
    }
}
