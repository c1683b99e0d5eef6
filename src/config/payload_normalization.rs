use serde::{Deserialize, Serialize};

/// Defines which posted payloads are replaced with an empty argument list before they reach the
/// worker.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PayloadNormalization {
    /// Only an absent payload (`null`) is replaced. `0`, `false` and `""` are delivered as is.
    #[default]
    Absent,
    /// Any falsy payload (`null`, `false`, `0`, `""`) is replaced. Matches the behavior of the
    /// classic browser wrapper and masks meaningful falsy values.
    Falsy,
}
