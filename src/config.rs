mod payload_normalization;
mod raw_config;
mod worker_config;

pub use self::{
    payload_normalization::PayloadNormalization, raw_config::RawConfig,
    worker_config::WorkerConfig,
};
