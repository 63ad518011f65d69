//! Background service for armored message detection.
//!
//! Reads accessibility events as JSON lines from stdin, one event per line,
//! and feeds them to an [`ArmorService`] through a bounded queue:
//!
//! ```text
//! {"event":"accessibility","event_type":"window_content_changed","root":{...}}
//! {"event":"overlay_clicked"}
//! {"event":"shutdown"}
//! ```
//!
//! Counters are printed as JSON on stdout when the stream ends.

use armor_extractor::config::Config;
use armor_extractor::daemon::{self, ServiceEvent};
use armor_extractor::decrypt::launcher_from_config;
use armor_extractor::overlay::LoggingOverlay;
use armor_extractor::service::ArmorService;
use armor_extractor::temp_storage::TemporaryStorage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Forward every parseable stdin line into the queue.
async fn read_events(tx: mpsc::Sender<ServiceEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("[DAEMON] ❌ Failed to read event stream: {}", e);
                break;
            }
        };
        line_number += 1;

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ServiceEvent>(&line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    log::debug!("[DAEMON] Event loop stopped; no longer reading");
                    break;
                }
            }
            Err(e) => log::warn!("[DAEMON] ⚠️ Skipping malformed event on line {}: {}", line_number, e),
        }
    }
}

#[tokio::main]
async fn main() {
    let (config, origin) = Config::read();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.general.log_level.as_str()))
        .init();
    origin.log();

    log::info!("[DAEMON] 🚀 Starting armor daemon");

    let directory = config.storage.resolved_directory();
    let storage = match TemporaryStorage::open(&directory, &config.storage.authority, config.storage.ttl_seconds) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!(
                "[ARMOR-DAEMON] ❌ Failed to open temporary store at {}: {}",
                directory.display(),
                e
            );
            std::process::exit(1);
        }
    };
    log::info!("[DAEMON] 📁 Temporary store: {}", directory.display());

    let launcher = launcher_from_config(&config.decrypt);
    let mut service = ArmorService::new(&config, storage, launcher, LoggingOverlay::new());

    let (tx, rx) = daemon::channel();
    let reader = tokio::spawn(read_events(tx));

    let stats = daemon::run(&mut service, rx).await;
    reader.abort();

    let exit_code = match serde_json::to_string(&serde_json::json!({ "stats": stats })) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("[ARMOR-DAEMON] ❌ Error serializing stats: {}", e);
            1
        }
    };

    // A blocked stdin read would otherwise hold the runtime open after a shutdown event
    std::process::exit(exit_code);
}
