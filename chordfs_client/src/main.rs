use chordfs_proto::chord::chord_client::ChordClient;
use chordfs_proto::chord::{Empty, FindSuccessorRequest, GetFileRequest, NodeInfo, StoreFileRequest};
use chordfs_proto::{Id, NodeRef};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tonic::Request;

/// Allow whole files in a single message.
const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the node to connect to
    #[arg(short, long, default_value = "http://127.0.0.1:4000")]
    node: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a stored file by name
    Lookup { name: String },
    /// Store a local file in the ring under its path
    Store { path: PathBuf },
    /// Find the node owning a hex identifier
    FindSuccessor { id: String },
    /// Print the node's routing state
    Print,
    /// Check that the node answers
    Ping,
}

fn describe(info: Option<NodeInfo>) -> String {
    match info {
        Some(info) => {
            let node = NodeRef::from(info);
            format!("{} {}", node.id(), node.address())
        }
        None => "-".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut client = ChordClient::connect(cli.node)
        .await?
        .max_decoding_message_size(MAX_MESSAGE_BYTES)
        .max_encoding_message_size(MAX_MESSAGE_BYTES);

    match cli.command {
        Commands::Lookup { name } => {
            let response = client.get_file(Request::new(GetFileRequest { name })).await;
            match response {
                Ok(response) => {
                    let reply = response.into_inner();
                    println!("Owner: {}", describe(reply.owner));
                    println!("Content:\n{}", String::from_utf8_lossy(&reply.data));
                }
                Err(status) => println!("Failed to get file: {}", status.message()),
            }
        }
        Commands::Store { path } => {
            let data = std::fs::read(&path)?;
            let name = path.to_string_lossy().into_owned();
            let reply = client
                .store_file(Request::new(StoreFileRequest { name, data }))
                .await?
                .into_inner();
            let key = Id::try_from(reply.key.as_slice())?;
            println!("Key: {}", key);
            for placement in reply.placements {
                let target = Id::try_from(placement.target.as_slice())?;
                if placement.stored {
                    println!("  {} -> {}", target, describe(placement.owner));
                } else {
                    println!("  {} failed: {}", target, placement.error);
                }
            }
        }
        Commands::FindSuccessor { id } => {
            let id: Id = id.parse()?;
            let request = Request::new(FindSuccessorRequest {
                id: id.to_vec(),
                hops: 0,
            });
            let node = client.find_successor(request).await?.into_inner();
            println!("Successor: {}", describe(Some(node)));
        }
        Commands::Print => {
            let state = client.get_state(Request::new(Empty {})).await?.into_inner();
            println!("Node {}", describe(state.node));
            println!("  predecessor {}", describe(state.predecessor));
            println!("  successors");
            for (i, s) in state.successors.into_iter().enumerate() {
                println!("    [{}] {}", i, describe(Some(s)));
            }
            println!("  fingers");
            for finger in state.fingers {
                println!("    [{}] {}", finger.index, describe(finger.node));
            }
            println!("  stored keys");
            for key in state.stored_keys {
                println!("    {}", key);
            }
        }
        Commands::Ping => {
            let reply = client.ping(Request::new(Empty {})).await?.into_inner();
            println!("alive: {}", reply.alive);
        }
    }

    Ok(())
}
