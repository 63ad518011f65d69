//! CLI entry point for the armor extractor.
//!
//! Works on JSON dumps of accessibility trees (see [`NodeSnapshot`]).
//!
//! # Usage
//!
//! ```bash
//! # Find armored messages in a tree dump and rebuild each of them
//! armor-extractor --scan tree.json
//!
//! # Rebuild armor from a flattened content description ("-" reads stdin)
//! armor-extractor --fix description.txt
//!
//! # Store the first message of a tree dump and launch the decryptor
//! armor-extractor --decrypt tree.json
//! ```

use std::env;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process;

use armor_extractor::armor::reconstruct;
use armor_extractor::config::Config;
use armor_extractor::decrypt::{decrypt_node, launcher_from_config};
use armor_extractor::locator::{debug_tree, NodeLocator, NodeSnapshot};
use armor_extractor::temp_storage::TemporaryStorage;

/// CLI command to execute
#[derive(Debug, Clone, PartialEq)]
enum Command {
    /// Locate and rebuild every message in a tree dump
    Scan(String),
    /// Rebuild armor from a flattened description
    Fix(String),
    /// Store a message and launch the decryptor
    Decrypt(String, usize),
    /// Print a tree dump as indented text
    DebugTree(String),
    /// Remove expired temporary files
    Cleanup,
    /// Write the effective configuration to a file
    WriteConfig(Option<String>),
    /// Show help message
    Help,
}

/// Parse command line arguments (without the program name)
fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(first) = args.first() else {
        return Ok(Command::Help);
    };

    match first.as_str() {
        "--scan" | "-s" => {
            let path = args.get(1).ok_or("--scan requires a tree dump path (e.g., --scan tree.json)")?;
            Ok(Command::Scan(path.clone()))
        }
        "--fix" | "-f" => {
            let path = args.get(1).ok_or("--fix requires a text file path or '-' for stdin")?;
            Ok(Command::Fix(path.clone()))
        }
        "--decrypt" => {
            let path = args.get(1).ok_or("--decrypt requires a tree dump path")?;
            let index = match args.get(2) {
                Some(raw) => raw
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid message index: {}", raw))?,
                None => 0,
            };
            Ok(Command::Decrypt(path.clone(), index))
        }
        "--debug-tree" | "-d" => {
            let path = args.get(1).ok_or("--debug-tree requires a tree dump path")?;
            Ok(Command::DebugTree(path.clone()))
        }
        "--cleanup" => Ok(Command::Cleanup),
        "--write-config" => Ok(Command::WriteConfig(args.get(1).cloned())),
        "--help" | "-h" => Ok(Command::Help),
        arg => Err(format!("Unknown argument: {}", arg)),
    }
}

/// Print help message to stdout
fn print_help() {
    println!("armor-extractor - Recover PGP messages from accessibility tree dumps");
    println!();
    println!("USAGE:");
    println!("    armor-extractor [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -s, --scan <TREE.json>           Find and rebuild all armored messages");
    println!("    -f, --fix <FILE|->               Rebuild armor from a flattened description");
    println!("        --decrypt <TREE.json> [N]    Hand message N (default 0) to the decryptor");
    println!("    -d, --debug-tree <TREE.json>     Print the tree for debugging");
    println!("        --cleanup                    Remove expired temporary files");
    println!("        --write-config [PATH]        Write the effective configuration (default: config path)");
    println!("    -h, --help                       Print this help message");
    println!();
    println!("CONFIGURATION:");
    println!("    Read from $ARMOR_EXTRACTOR_CONFIG or {}", Config::default_config_path().display());
    println!();
    println!("OUTPUT:");
    println!("    --scan, --decrypt, --cleanup and --write-config print JSON to stdout.");
    println!("    Errors are written to stderr.");
}

fn load_tree(path: &str) -> Result<NodeSnapshot, String> {
    let contents = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    serde_json::from_str(&contents).map_err(|e| format!("Invalid tree dump {}: {}", path, e))
}

fn open_storage(config: &Config) -> Result<TemporaryStorage, String> {
    let directory = config.storage.resolved_directory();
    TemporaryStorage::open(&directory, &config.storage.authority, config.storage.ttl_seconds)
        .map_err(|e| format!("Failed to open temporary store at {}: {}", directory.display(), e))
}

fn locator(config: &Config) -> NodeLocator {
    NodeLocator::new(&config.locator.web_view_class, &config.locator.text_run_class)
}

fn print_json(value: &serde_json::Value) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ Error serializing output: {}", e);
            1
        }
    }
}

/// Handle the --scan command
fn handle_scan(config: &Config, path: &str) -> i32 {
    let root = match load_tree(path) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ {}", e);
            return 1;
        }
    };

    let nodes = locator(config).find_pgp_nodes(&&root);
    eprintln!("[ARMOR-EXTRACTOR] 🔍 Found {} armored message(s)", nodes.len());

    // Each node is rebuilt on its own; a failure only marks that entry
    let messages: Vec<serde_json::Value> = nodes
        .iter()
        .map(|node| match reconstruct(&node.text) {
            Ok(armored) => serde_json::json!({
                "bounds": node.bounds,
                "armor": armored,
            }),
            Err(e) => serde_json::json!({
                "bounds": node.bounds,
                "error": e.to_string(),
                "error_kind": e.kind(),
            }),
        })
        .collect();

    print_json(&serde_json::json!({
        "count": messages.len(),
        "messages": messages,
    }))
}

/// Handle the --fix command
fn handle_fix(path: &str) -> i32 {
    let mut text = String::new();
    let read = if path == "-" {
        std::io::stdin().read_to_string(&mut text).map(|_| ())
    } else {
        fs::read_to_string(path).map(|contents| text = contents)
    };
    if let Err(e) = read {
        eprintln!("[ARMOR-EXTRACTOR] ❌ Failed to read {}: {}", path, e);
        return 1;
    }

    match reconstruct(text.trim_end()) {
        Ok(armored) => {
            println!("{}", armored);
            0
        }
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ {}", e);
            2
        }
    }
}

/// Handle the --decrypt command
fn handle_decrypt(config: &Config, path: &str, index: usize) -> i32 {
    let root = match load_tree(path) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ {}", e);
            return 1;
        }
    };

    let nodes = locator(config).find_pgp_nodes(&&root);
    let node = match nodes.get(index) {
        Some(node) => node,
        None => {
            eprintln!(
                "[ARMOR-EXTRACTOR] ❌ No armored message at index {} ({} found)",
                index,
                nodes.len()
            );
            return 1;
        }
    };

    let storage = match open_storage(config) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ {}", e);
            return 1;
        }
    };
    let mut launcher = launcher_from_config(&config.decrypt);

    match decrypt_node(node, &storage, &mut launcher, &config.decrypt.action) {
        Ok(request) => match serde_json::to_value(&request) {
            Ok(value) => print_json(&value),
            Err(e) => {
                eprintln!("[ARMOR-EXTRACTOR] ❌ Error serializing output: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ Decrypt hand-off failed: {}", e);
            2
        }
    }
}

/// Handle the --debug-tree command
fn handle_debug_tree(path: &str) -> i32 {
    match load_tree(path) {
        Ok(root) => {
            print!("{}", debug_tree(&&root));
            0
        }
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ {}", e);
            1
        }
    }
}

/// Handle the --cleanup command
fn handle_cleanup(config: &Config) -> i32 {
    let storage = match open_storage(config) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ {}", e);
            return 1;
        }
    };

    match storage.cleanup_expired() {
        Ok(removed) => print_json(&serde_json::json!({ "removed": removed })),
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ Cleanup failed: {}", e);
            1
        }
    }
}

/// Handle the --write-config command
fn handle_write_config(config: &Config, path: Option<&str>) -> i32 {
    let path = path.map(PathBuf::from).unwrap_or_else(Config::config_path);
    if path.exists() {
        eprintln!("[ARMOR-EXTRACTOR] ❌ Refusing to overwrite {}", path.display());
        return 1;
    }

    match config.save_to_path(path.clone()) {
        Ok(()) => print_json(&serde_json::json!({ "path": path })),
        Err(e) => {
            eprintln!("[ARMOR-EXTRACTOR] ❌ Failed to write {}: {}", path.display(), e);
            1
        }
    }
}

fn main() {
    let (config, origin) = Config::read();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.general.log_level.as_str()))
        .init();
    origin.log();

    log::debug!("armor-extractor starting");

    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information.");
            process::exit(1);
        }
    };

    log::debug!("Executing command: {:?}", command);

    let exit_code = match command {
        Command::Scan(path) => handle_scan(&config, &path),
        Command::Fix(path) => handle_fix(&path),
        Command::Decrypt(path, index) => handle_decrypt(&config, &path, index),
        Command::DebugTree(path) => handle_debug_tree(&path),
        Command::Cleanup => handle_cleanup(&config),
        Command::WriteConfig(path) => handle_write_config(&config, path.as_deref()),
        Command::Help => {
            print_help();
            0
        }
    };

    log::debug!("Exiting with code: {}", exit_code);

    process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_empty_is_help() {
        assert_eq!(parse_args(&[]), Ok(Command::Help));
    }

    #[test]
    fn test_parse_args_commands() {
        assert_eq!(parse_args(&args(&["-s", "t.json"])), Ok(Command::Scan("t.json".into())));
        assert_eq!(parse_args(&args(&["--fix", "-"])), Ok(Command::Fix("-".into())));
        assert_eq!(
            parse_args(&args(&["--decrypt", "t.json"])),
            Ok(Command::Decrypt("t.json".into(), 0))
        );
        assert_eq!(
            parse_args(&args(&["--decrypt", "t.json", "2"])),
            Ok(Command::Decrypt("t.json".into(), 2))
        );
        assert_eq!(parse_args(&args(&["--cleanup"])), Ok(Command::Cleanup));
        assert_eq!(parse_args(&args(&["--write-config"])), Ok(Command::WriteConfig(None)));
        assert_eq!(
            parse_args(&args(&["--write-config", "c.toml"])),
            Ok(Command::WriteConfig(Some("c.toml".into())))
        );
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["--scan"])).is_err());
        assert!(parse_args(&args(&["--decrypt", "t.json", "x"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }
}
