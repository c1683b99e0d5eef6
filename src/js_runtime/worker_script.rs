use crate::script_worker::ScriptLocation;
use anyhow::Context;

/// Where the worker script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerScriptSource {
    /// Script file referenced by a path or `file:` URL.
    Location(ScriptLocation),
    /// Script text supplied directly by the host.
    Inline(String),
}

/// A script the worker executes before it starts processing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerScript {
    /// Name reported in the error events raised by the script.
    pub name: String,
    /// Source of the script text.
    pub source: WorkerScriptSource,
}

impl WorkerScript {
    pub fn from_location(location: ScriptLocation) -> Self {
        Self {
            name: location.as_str().to_string(),
            source: WorkerScriptSource::Location(location),
        }
    }

    pub fn inline(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: WorkerScriptSource::Inline(source.into()),
        }
    }

    /// Reads the script text.
    pub async fn load(&self) -> anyhow::Result<String> {
        match self.source {
            WorkerScriptSource::Location(ref location) => {
                let path = location.resolve()?;
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to load worker script from {}.", path.display()))
            }
            WorkerScriptSource::Inline(ref source) => Ok(source.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{WorkerScript, WorkerScriptSource};
    use crate::script_worker::ScriptLocation;

    #[tokio::test]
    async fn can_load_inline_script() -> anyhow::Result<()> {
        let script = WorkerScript::inline("inline.js", "postMessage(1);");
        assert_eq!(script.name, "inline.js");
        assert_eq!(script.load().await?, "postMessage(1);");

        Ok(())
    }

    #[tokio::test]
    async fn can_load_script_from_file() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("worker2-{}.js", uuid::Uuid::now_v7()));
        std::fs::write(&path, "postMessage(2);")?;

        let location = ScriptLocation::try_from(path.as_path())?;
        let script = WorkerScript::from_location(location.clone());
        assert_eq!(script.name, path.to_string_lossy());
        assert_eq!(script.source, WorkerScriptSource::Location(location));

        let source = script.load().await;
        std::fs::remove_file(&path)?;
        assert_eq!(source?, "postMessage(2);");

        Ok(())
    }

    #[tokio::test]
    async fn fails_to_load_missing_script() -> anyhow::Result<()> {
        let script = WorkerScript::from_location(ScriptLocation::try_from(
            "./target/worker2-missing-script.js",
        )?);
        assert_eq!(
            script.load().await.unwrap_err().to_string(),
            "Failed to load worker script from ./target/worker2-missing-script.js."
        );

        Ok(())
    }
}
