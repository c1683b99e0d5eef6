//! Runs JS scripts and registered Rust functions in background workers, exchanging JSON
//! messages with them through [`ScriptWorker`] and [`FunctionWorker`] handles.

#![deny(warnings)]

mod config;
mod error;
mod function_worker;
mod js_runtime;
mod script_worker;
mod worker;

pub use crate::{
    config::{PayloadNormalization, RawConfig, WorkerConfig},
    error::{Error, ErrorKind},
    function_worker::{CommandTable, FunctionWorker},
    script_worker::{ScriptLocation, ScriptWorker},
    worker::{ErrorHandler, MessageHandler, WorkerHandlers},
};
pub use worker2_types::{
    events::{ErrorEvent, ErrorEventKind, MessageEvent},
    jobs::FunctionJob,
};
