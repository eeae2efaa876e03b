use serde::{Deserialize, Serialize};

/// Connection settings for one APIC, supplied programmatically per site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApicConfig {
    pub username: String,
    pub password: String,
    /// Base endpoint, e.g. `https://apic1.example.com`, without a trailing slash.
    pub base_uri: String,
    /// Verify the APIC's TLS certificate. Lab fabrics commonly run with
    /// self-signed certificates, so this is configurable per session rather
    /// than process-wide.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Site name stamped onto extracted node records.
    pub site: String
}

fn default_verify_tls() -> bool {
    true
}

impl ApicConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        base_uri: impl Into<String>,
        verify_tls: bool,
        site: impl Into<String>
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_uri: base_uri.into(),
            verify_tls,
            site: site.into()
        }
    }
}
