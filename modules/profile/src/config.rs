use serde::{Deserialize, Serialize};

/// Configuration for the profile module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Key of the one aggregate this deployment serves (`/profile/{key}`).
    #[serde(default = "default_profile_key")]
    pub profile_key: String,
    /// Mount point of the profile routes and the relay socket.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_max_bio_length")]
    pub max_bio_length: usize,
    #[serde(default = "default_relay_capacity")]
    pub relay_capacity: usize,
    #[serde(default = "default_events_capacity")]
    pub events_capacity: usize,
    /// Relative paths are resolved against the server home dir.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile_key: default_profile_key(),
            api_prefix: default_api_prefix(),
            max_bio_length: default_max_bio_length(),
            relay_capacity: default_relay_capacity(),
            events_capacity: default_events_capacity(),
            uploads_dir: default_uploads_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_profile_key() -> String {
    "demo".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_max_bio_length() -> usize {
    500
}

fn default_relay_capacity() -> usize {
    256
}

fn default_events_capacity() -> usize {
    64
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}
