#![deny(warnings)]

use anyhow::anyhow;
use clap::{crate_authors, crate_description, crate_version, Arg, ArgAction, Command};
use serde_json::Value as JsonValue;
use std::{
    env,
    sync::mpsc,
    time::{Duration, Instant},
};
use tracing::{error, info};
use worker2::{RawConfig, ScriptWorker, WorkerHandlers};

fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    if env::var("RUST_LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().json().flatten_event(true).init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let matches = Command::new("Worker2 script runner.")
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .arg(
            Arg::new("CONFIG")
                .env("WORKER2_CONFIG")
                .short('c')
                .long("config")
                .default_value("worker2.toml")
                .help("Path to the Worker2 configuration file."),
        )
        .arg(
            Arg::new("SCRIPT")
                .required(true)
                .index(1)
                .help("Path or `file:` URL of the worker script."),
        )
        .arg(
            Arg::new("MESSAGE")
                .short('m')
                .long("message")
                .action(ArgAction::Append)
                .value_parser(|value: &str| serde_json::from_str::<JsonValue>(value))
                .help("JSON message to post to the worker, can be repeated."),
        )
        .arg(
            Arg::new("WAIT")
                .env("WORKER2_WAIT")
                .short('w')
                .long("wait")
                .default_value("5s")
                .value_parser(humantime::parse_duration)
                .help("Defines how long to wait for the worker replies (e.g. `500ms`, `10s`)."),
        )
        .get_matches();

    let raw_config = RawConfig::read_from_file(
        matches
            .get_one::<String>("CONFIG")
            .ok_or_else(|| anyhow!("<CONFIG> argument is not provided."))?,
    )?;

    info!(config = ?raw_config, "Worker2 raw configuration.");

    let script = matches
        .get_one::<String>("SCRIPT")
        .ok_or_else(|| anyhow!("<SCRIPT> argument is not provided."))?;
    let messages = matches
        .get_many::<JsonValue>("MESSAGE")
        .map(|messages| messages.cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    let wait = *matches
        .get_one::<Duration>("WAIT")
        .ok_or_else(|| anyhow!("<WAIT> argument is not provided."))?;

    // `None` signals that the worker has stopped and no more replies will come.
    let (replies_tx, replies_rx) = mpsc::channel::<Option<JsonValue>>();
    let errors_tx = replies_tx.clone();
    let worker = ScriptWorker::with_config(
        script,
        WorkerHandlers::new()
            .on_message(move |data, _| {
                let _ = replies_tx.send(Some(data));
            })
            .on_error(move |event| {
                error!(
                    worker_id = %event.worker_id,
                    kind = ?event.kind,
                    filename = event.filename.as_deref(),
                    lineno = event.lineno,
                    colno = event.colno,
                    "Worker error: {}",
                    event.message
                );

                if event.kind.is_fatal() {
                    let _ = errors_tx.send(None);
                }
            }),
        raw_config.worker,
    )?;

    for message in &messages {
        worker.post_message(message)?;
    }

    let deadline = Instant::now() + wait;
    let mut replies = 0;
    while messages.is_empty() || replies < messages.len() {
        let Some(time_left) = deadline.checked_duration_since(Instant::now()) else {
            break;
        };

        match replies_rx.recv_timeout(time_left) {
            Ok(Some(data)) => {
                println!("{data}");
                replies += 1;
            }
            Ok(None) | Err(_) => break,
        }
    }

    worker.terminate();
    info!(worker_id = %worker.id(), replies, "Worker2 runner finished.");

    Ok(())
}
