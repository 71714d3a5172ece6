use crate::wire::frame::HttpSettings;

/// Server connection configuration.
#[derive(Default, Debug, Clone)]
pub struct ServerConf {
    /// Settings advertised in the initial SETTINGS frame. Unset fields
    /// keep the RFC 7540 defaults.
    pub http2_settings: Option<HttpSettings>,

    /// Milliseconds the client has to complete the connection preface.
    pub preface_timeout: Option<u64>,

    /// Milliseconds the client has to acknowledge our SETTINGS.
    pub settings_timeout: Option<u64>,

    /// Milliseconds of loop inactivity before the connection is dropped.
    pub idle_timeout: Option<u64>,
}

pub(crate) const DEFAULT_PREFACE_TIMEOUT_MS: u64 = 5_000;
pub(crate) const DEFAULT_SETTINGS_TIMEOUT_MS: u64 = 5_000;
pub(crate) const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;

impl ServerConf {
    pub fn new() -> ServerConf {
        Default::default()
    }

    pub(crate) fn preface_timeout_ms(&self) -> u64 {
        self.preface_timeout.unwrap_or(DEFAULT_PREFACE_TIMEOUT_MS)
    }

    pub(crate) fn settings_timeout_ms(&self) -> u64 {
        self.settings_timeout.unwrap_or(DEFAULT_SETTINGS_TIMEOUT_MS)
    }

    pub(crate) fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT_MS)
    }
}
