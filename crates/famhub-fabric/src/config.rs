use serde::{Deserialize, Serialize};

/// Configuration for the [`ListenerCenter`](crate::ListenerCenter).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Name of the delivery thread, as shown in debuggers and panics.
    pub thread_name: String,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            thread_name: "famhub-delivery".to_string(),
        }
    }
}
