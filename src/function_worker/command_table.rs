use anyhow::{anyhow, bail, Context};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use worker2_types::jobs::FunctionJob;

type Operation = Arc<dyn Fn(Vec<JsonValue>) -> anyhow::Result<JsonValue> + Send + Sync>;

/// Named operations a function worker can run. Operations receive positional arguments and
/// return a value that is posted back to the caller.
#[derive(Clone, Default)]
pub struct CommandTable {
    operations: HashMap<String, Operation>,
}

impl CommandTable {
    /// Registers an operation with typed arguments. Arguments are decoded from the job argument
    /// array, use a tuple to receive them positionally (e.g. `|(a, b): (i64, i64)| Ok(a + b)`).
    pub fn register<Args, Output, F>(&mut self, name: impl Into<String>, operation: F) -> &mut Self
    where
        Args: DeserializeOwned,
        Output: Serialize,
        F: Fn(Args) -> anyhow::Result<Output> + Send + Sync + 'static,
    {
        self.register_raw(name, move |args| {
            let args = serde_json::from_value(JsonValue::Array(args))
                .context("Invalid operation arguments.")?;
            Ok(serde_json::to_value(operation(args)?)?)
        })
    }

    /// Registers an operation that works with raw JSON arguments.
    pub fn register_raw<F>(&mut self, name: impl Into<String>, operation: F) -> &mut Self
    where
        F: Fn(Vec<JsonValue>) -> anyhow::Result<JsonValue> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Arc::new(operation));
        self
    }

    /// Checks whether an operation with the specified name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Returns names of all registered operations in alphabetical order.
    pub fn operations(&self) -> Vec<&str> {
        let mut operations = self
            .operations
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>();
        operations.sort_unstable();
        operations
    }

    /// Applies the job operation to the job arguments. Fails if the operation isn't registered,
    /// the arguments aren't an array, or the operation fails or panics.
    pub fn execute(&self, job: &FunctionJob) -> anyhow::Result<JsonValue> {
        let operation = self
            .operations
            .get(&job.operation)
            .ok_or_else(|| anyhow!("Unknown operation `{}`.", job.operation))?;

        let JsonValue::Array(ref args) = job.args else {
            bail!(
                "Arguments of operation `{}` must be an array, but received `{}`.",
                job.operation,
                job.args
            );
        };

        match panic::catch_unwind(AssertUnwindSafe(|| operation(args.clone()))) {
            Ok(result) => result,
            Err(payload) => bail!(
                "Operation `{}` panicked: {}",
                job.operation,
                panic_message(payload.as_ref())
            ),
        }
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTable")
            .field("operations", &self.operations())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
