use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A structured request for a function worker: which registered operation to run and the
/// arguments to apply it to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionJob {
    /// Name of the operation registered in the worker command table.
    pub operation: String,
    /// Positional arguments. Expected to be an array, anything else is rejected by the worker.
    pub args: JsonValue,
}

impl FunctionJob {
    /// Creates a new job for the specified operation.
    pub fn new(operation: impl Into<String>, args: JsonValue) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::jobs::FunctionJob;
    use serde_json::json;

    #[test]
    fn serialization() -> anyhow::Result<()> {
        let job = FunctionJob::new("add", json!([2, 3]));
        assert_eq!(
            serde_json::to_value(&job)?,
            json!({ "operation": "add", "args": [2, 3] })
        );
        assert_eq!(
            serde_json::from_value::<FunctionJob>(json!({ "operation": "add", "args": [] }))?,
            FunctionJob::new("add", json!([]))
        );

        Ok(())
    }
}
