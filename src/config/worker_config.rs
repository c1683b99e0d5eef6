use crate::config::PayloadNormalization;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

/// Configuration shared by all workers.
#[serde_as]
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// The hard limit for the script worker heap size in bytes. Defaults to 10485760 bytes or
    /// 10 MB.
    pub max_heap_size: usize,
    /// The maximum duration of the script evaluation and of every single message dispatch.
    /// Defaults to 10 seconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_execution_time: Duration,
    /// Defines which posted payloads are replaced with an empty argument list.
    pub payload_normalization: PayloadNormalization,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_heap_size: 10_485_760,
            max_execution_time: Duration::from_secs(10),
            payload_normalization: PayloadNormalization::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{PayloadNormalization, WorkerConfig};
    use insta::assert_toml_snapshot;
    use std::time::Duration;

    #[test]
    fn serialization_and_default() {
        let config = WorkerConfig::default();
        assert_toml_snapshot!(config, @r###"
        max_heap_size = 10485760
        max_execution_time = 10000
        payload_normalization = 'absent'
        "###);
    }

    #[test]
    fn deserialization() {
        let config: WorkerConfig = toml::from_str(
            r#"
        max_heap_size = 10485760
        max_execution_time = 10000
        payload_normalization = 'absent'
    "#,
        )
        .unwrap();
        assert_eq!(config, WorkerConfig::default());

        let config: WorkerConfig = toml::from_str(
            r#"
        max_heap_size = 20485760
        max_execution_time = 500
        payload_normalization = 'falsy'
    "#,
        )
        .unwrap();
        assert_eq!(
            config,
            WorkerConfig {
                max_heap_size: 20485760,
                max_execution_time: Duration::from_millis(500),
                payload_normalization: PayloadNormalization::Falsy,
            }
        );
    }
}
