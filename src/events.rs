use std::sync::Arc;

/// Events emitted by the session controller and audio downloads
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A persisted token was validated on startup
    SessionRestored { username: String },

    /// A persisted token failed validation and the session was cleared
    SessionExpired { reason: String },

    /// Login succeeded
    LoggedIn { username: String },

    /// Login was rejected or could not be sent
    LoginFailed { message: String },

    /// A new account was created
    Registered { username: String },

    /// Registration was rejected or could not be sent
    RegisterFailed { message: String },

    /// The session was ended by the user
    LoggedOut,

    /// An audio download is starting
    DownloadStarting {
        episode_title: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        episode_title: String,
        bytes_downloaded: u64,
        hash: String,
    },

    /// A download failed
    DownloadFailed { episode_title: String, error: String },
}

/// Observer for client events.
///
/// Front ends implement this to render messages or progress bars.
pub trait EventReporter: Send + Sync {
    /// Report an event
    fn report(&self, event: ClientEvent);
}

/// A shared reference to an event reporter
pub type SharedEventReporter = Arc<dyn EventReporter>;

/// A no-op reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl EventReporter for NoopReporter {
    fn report(&self, _event: ClientEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedEventReporter {
        Arc::new(Self)
    }
}
