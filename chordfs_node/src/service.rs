use crate::error::ChordError;
use crate::node::Node;
use chordfs_proto::chord::chord_server::Chord;
use chordfs_proto::chord::{
    Empty, FindSuccessorRequest, FingerEntry, GetFileReply, GetFileRequest, IdRequest, NodeInfo,
    NodeState as ProtoNodeState, NotifyReply, PingReply, Placement, PredecessorReply,
    StoreFileReply, StoreFileRequest, SuccessorList,
};
use chordfs_proto::{hash, Id, NodeRef};
use log::info;
use tonic::{Request, Response, Status};

fn parse_id(bytes: &[u8]) -> Result<Id, Status> {
    Ok(Id::try_from(bytes).map_err(ChordError::from)?)
}

#[tonic::async_trait]
impl Chord for Node {
    async fn find_successor(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<NodeInfo>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.id)?;
        let successor = self.find_successor(id, req.hops).await?;
        Ok(Response::new(successor.into()))
    }

    async fn closest_preceding_node(
        &self,
        request: Request<IdRequest>,
    ) -> Result<Response<NodeInfo>, Status> {
        let id = parse_id(&request.into_inner().id)?;
        let node = self.closest_preceding_node(id).await;
        Ok(Response::new(node.into()))
    }

    async fn notify(&self, request: Request<NodeInfo>) -> Result<Response<NotifyReply>, Status> {
        let candidate = NodeRef::from(request.into_inner());
        let accepted = self.notify(candidate).await;
        let successors = self.successors().await.iter().map(NodeInfo::from).collect();
        Ok(Response::new(NotifyReply {
            accepted,
            successors,
        }))
    }

    async fn get_predecessor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<PredecessorReply>, Status> {
        let predecessor = self.predecessor().await.map(NodeInfo::from);
        Ok(Response::new(PredecessorReply { predecessor }))
    }

    async fn get_successor_list(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<SuccessorList>, Status> {
        let successors = self.successors().await.iter().map(NodeInfo::from).collect();
        Ok(Response::new(SuccessorList { successors }))
    }

    async fn ping(&self, _request: Request<Empty>) -> Result<Response<PingReply>, Status> {
        Ok(Response::new(PingReply { alive: true }))
    }

    async fn store_file(
        &self,
        request: Request<StoreFileRequest>,
    ) -> Result<Response<StoreFileReply>, Status> {
        let req = request.into_inner();
        let key = hash(req.name.as_bytes());
        info!(
            "Node {}: storing '{}' ({} bytes) as {}",
            self.id.short(),
            req.name,
            req.data.len(),
            key
        );
        let placements = self
            .store(key, &req.data)
            .await
            .into_iter()
            .map(|p| Placement {
                target: p.target.to_vec(),
                stored: p.is_stored(),
                owner: p.owner.map(NodeInfo::from),
                error: p.error.unwrap_or_default(),
            })
            .collect();
        Ok(Response::new(StoreFileReply {
            key: key.to_vec(),
            placements,
        }))
    }

    async fn get_file(
        &self,
        request: Request<GetFileRequest>,
    ) -> Result<Response<GetFileReply>, Status> {
        let name = request.into_inner().name;
        let (owner, data) = self.get_file(hash(name.as_bytes())).await?;
        Ok(Response::new(GetFileReply {
            owner: Some(owner.into()),
            data,
        }))
    }

    async fn get_state(&self, _request: Request<Empty>) -> Result<Response<ProtoNodeState>, Status> {
        let stored_keys = self
            .local_store()
            .keys()
            .await?
            .iter()
            .map(Id::to_string)
            .collect();
        let state = self.state.read().await;
        let fingers = (1..=chordfs_proto::ID_BITS)
            .filter_map(|index| {
                state.finger(index).map(|node| FingerEntry {
                    index,
                    node: Some(node.into()),
                })
            })
            .collect();
        Ok(Response::new(ProtoNodeState {
            id: self.id.to_vec(),
            node: Some(NodeInfo::from(&self.me)),
            predecessor: state.predecessor.as_ref().map(NodeInfo::from),
            successors: state.successors.iter().map(NodeInfo::from).collect(),
            fingers,
            stored_keys,
        }))
    }
}
