use crate::error::Result;
use crate::node::Node;
use chordfs_proto::hash;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const USAGE: &str = "\
Usage: [command]
Commands:
  lookup <key>  - fetch the file stored under <key> and show its owner
  store <path>  - store a local file in the ring under its path
  print         - print this node's routing state
  help          - print this message
  exit          - exit the node";

#[derive(Debug, PartialEq, Eq)]
pub enum ShellOutput {
    Text(String),
    Exit,
}

/// Runs one shell line. Blank lines produce no output.
pub async fn execute(node: &Node, line: &str) -> Option<ShellOutput> {
    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    let param = parts.next();

    let text = match (command, param) {
        ("lookup", None) => "No key supplied".to_string(),
        ("lookup", Some(key)) => match node.get_file(hash(key)).await {
            Ok((owner, data)) => format!(
                "ID: {}\nAddress: {}\nContent:\n{}",
                owner.id(),
                owner.address(),
                String::from_utf8_lossy(&data)
            ),
            Err(e) => format!("Failed to get file: {}", e),
        },
        ("store", None) => "No path supplied".to_string(),
        ("store", Some(path)) => match tokio::fs::read(path).await {
            Ok(data) => {
                let key = hash(path);
                let placements = node.store(key, &data).await;
                let stored = placements.iter().filter(|p| p.is_stored()).count();
                if stored == 0 {
                    format!("Failed to store {}: no placement succeeded", path)
                } else {
                    format!(
                        "Stored {} as {} ({}/{} placements)",
                        path,
                        key,
                        stored,
                        placements.len()
                    )
                }
            }
            Err(e) => format!("Failed to read file: {}", e),
        },
        ("print", _) => node.describe().await,
        ("help", _) => USAGE.to_string(),
        ("exit", _) => return Some(ShellOutput::Exit),
        (other, _) => format!("Unknown command: {}\n{}", other, USAGE),
    };
    Some(ShellOutput::Text(text))
}

/// Reads commands from stdin. Returns `true` when the user typed `exit` and
/// `false` when input ended.
pub async fn run(node: Node) -> Result<bool> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            return Ok(false);
        };
        match execute(&node, &line).await {
            Some(ShellOutput::Text(text)) => println!("{}", text),
            Some(ShellOutput::Exit) => {
                println!("Exiting...");
                return Ok(true);
            }
            None => {}
        }
    }
}
