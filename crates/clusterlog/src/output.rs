//! Terminal output formatting

use colored::Colorize;
use clusterlog_core::{LogCategoryIndex, NodeInfo, ResolvedLog};
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{settings::Style, Table, Tabled};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable JSON output mode
pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if JSON output mode is enabled
pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

#[derive(Tabled)]
pub struct NodeRow {
    #[tabled(rename = "node id")]
    pub node_id: String,
    #[tabled(rename = "ip")]
    pub node_ip: String,
    #[tabled(rename = "state")]
    pub state: String,
}

impl From<&NodeInfo> for NodeRow {
    fn from(node: &NodeInfo) -> Self {
        let state = if node.alive {
            "alive".green().to_string()
        } else {
            "dead".red().to_string()
        };
        NodeRow {
            node_id: node.node_id.clone(),
            node_ip: node.node_ip.clone(),
            state,
        }
    }
}

pub fn print_nodes(nodes: &[NodeInfo]) {
    if is_json_mode() {
        print_json(nodes);
        return;
    }

    if nodes.is_empty() {
        println!("No nodes registered");
        return;
    }

    let rows: Vec<NodeRow> = nodes.iter().map(NodeRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

#[derive(Serialize)]
struct LogIndexJson<'a> {
    node_id: &'a str,
    logs: &'a LogCategoryIndex,
}

pub fn print_log_index(node_id: &str, index: &LogCategoryIndex) {
    if is_json_mode() {
        print_json(&LogIndexJson {
            node_id,
            logs: index,
        });
        return;
    }

    if index.is_empty() {
        println!("No log files on {}", node_id);
        return;
    }

    println!("{} {} ({} files)", "Node".bold(), node_id, index.total());
    for (category, files) in index.iter() {
        println!("{}", format!("{}:", category).cyan().bold());
        for file in files {
            println!("  {}", file);
        }
    }
}

pub fn print_resolved(log: &ResolvedLog) {
    if is_json_mode() {
        print_json(log);
        return;
    }

    println!("  {} │ {}", "Node".bold(), log.node_id);
    println!("  {} │ {}", "File".bold(), log.file_name);
}

pub fn print_node_id(node_ip: &str, node_id: Option<&str>) {
    if is_json_mode() {
        print_json(&serde_json::json!({ "node_ip": node_ip, "node_id": node_id }));
        return;
    }

    match node_id {
        Some(id) => println!("{}", id),
        None => print_error(&format!("No alive node has ip {}", node_ip)),
    }
}

pub fn print_node_state(node_id: &str, alive: bool) {
    if is_json_mode() {
        print_json(&serde_json::json!({ "node_id": node_id, "alive": alive }));
        return;
    }

    let state = if alive { "alive" } else { "dead" };
    print_success(&format!("Node {} marked {}", node_id, state));
}

/// Write raw log content to stdout; false once stdout is gone
pub fn write_chunk(out: &mut impl Write, chunk: &[u8]) -> bool {
    out.write_all(chunk).and_then(|_| out.flush()).is_ok()
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}
