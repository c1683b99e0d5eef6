use crate::error::Error;
use anyhow::{anyhow, bail};
use serde_json::Value as JsonValue;
use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};
use url::Url;

/// Textual location of a worker script: a filesystem path or a `file:` URL. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptLocation(String);

impl ScriptLocation {
    /// Returns the location as it was supplied.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves location to a filesystem path. URLs with schemes other than `file` aren't
    /// supported.
    pub fn resolve(&self) -> anyhow::Result<PathBuf> {
        match Url::parse(&self.0) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| anyhow!("Script location `{}` isn't a valid file URL.", self.0)),
            // Single letter schemes are Windows drive letters.
            Ok(url) if url.scheme().len() > 1 => {
                bail!("Unsupported script location scheme `{}`.", url.scheme())
            }
            _ => Ok(PathBuf::from(&self.0)),
        }
    }
}

impl Display for ScriptLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ScriptLocation {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(Error::invalid_argument(
                "Invalid script location: must not be empty.",
            ));
        }

        Ok(Self(value))
    }
}

impl TryFrom<&str> for ScriptLocation {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl TryFrom<&String> for ScriptLocation {
    type Error = Error;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl TryFrom<&Path> for ScriptLocation {
    type Error = Error;

    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        value
            .to_str()
            .ok_or_else(|| Error::invalid_argument("Invalid script location: must be UTF-8."))
            .and_then(Self::try_from)
    }
}

impl TryFrom<JsonValue> for ScriptLocation {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::String(value) => Self::try_from(value),
            _ => Err(Error::invalid_argument(
                "Invalid type: script location must be a string.",
            )),
        }
    }
}

impl TryFrom<&JsonValue> for ScriptLocation {
    type Error = Error;

    fn try_from(value: &JsonValue) -> Result<Self, Self::Error> {
        Self::try_from(value.clone())
    }
}
