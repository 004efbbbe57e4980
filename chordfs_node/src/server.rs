use crate::constants::MAX_FILE_BYTES;
use crate::error::Result;
use crate::node::Node;
use crate::transfer::{TlsMaterial, TransferService};
use chordfs_proto::chord::chord_server::ChordServer;
use chordfs_proto::chord::transfer_server::TransferServer;
use log::{error, info};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

/// The two listener tasks of a running node.
pub struct ServerHandle {
    pub rpc: JoinHandle<()>,
    pub transfer: JoinHandle<()>,
}

impl ServerHandle {
    /// Stops accepting connections on both addresses.
    pub async fn shutdown(self) {
        self.rpc.abort();
        self.transfer.abort();
        let _ = self.rpc.await;
        let _ = self.transfer.await;
    }
}

/// Serves the ring RPCs and the transfer channel on already bound listeners.
/// Binding is left to the caller so bind failures surface before any task
/// is spawned.
pub fn serve(
    node: &Node,
    rpc_listener: TcpListener,
    transfer_listener: TcpListener,
    tls: Option<&TlsMaterial>,
) -> Result<ServerHandle> {
    let mut transfer_builder = Server::builder();
    if let Some(tls) = tls {
        transfer_builder = transfer_builder.tls_config(tls.server_config())?;
    }
    let transfer_service = TransferServer::new(TransferService::new(node.local_store().clone()))
        .max_decoding_message_size(MAX_FILE_BYTES)
        .max_encoding_message_size(MAX_FILE_BYTES);
    let transfer_addr = node.me.transfer_address().to_string();
    let transfer = tokio::spawn(async move {
        info!("Transfer channel listening on {}", transfer_addr);
        if let Err(e) = transfer_builder
            .add_service(transfer_service)
            .serve_with_incoming(TcpListenerStream::new(transfer_listener))
            .await
        {
            error!("Transfer server on {} stopped: {}", transfer_addr, e);
        }
    });

    let chord_service = ChordServer::new(node.clone())
        .max_decoding_message_size(MAX_FILE_BYTES)
        .max_encoding_message_size(MAX_FILE_BYTES);
    let rpc_addr = node.me.address().to_string();
    let rpc = tokio::spawn(async move {
        info!("Server listening on {}", rpc_addr);
        if let Err(e) = Server::builder()
            .add_service(chord_service)
            .serve_with_incoming(TcpListenerStream::new(rpc_listener))
            .await
        {
            error!("RPC server on {} stopped: {}", rpc_addr, e);
        }
    });

    Ok(ServerHandle { rpc, transfer })
}
