pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod filename;
pub mod http;
pub mod models;
pub mod session;
pub mod storage;

// Re-export main types for convenience
pub use audio::{DownloadResult, download_audio};
pub use config::ClientConfig;
pub use error::{ApiError, AuthError, DownloadError, StorageError, ValidationError};
pub use events::{ClientEvent, EventReporter, NoopReporter, SharedEventReporter};
pub use filename::{audio_extension, generate_filename, generate_filename_stem};
pub use http::{ApiRequest, ApiResponse, HttpClient, HttpResponse, ReqwestClient};
pub use models::{
    AudioFile, Episode, NewEpisode, NewPodcast, Podcast, Role, SearchResults, User,
};
pub use session::{Session, SessionController, View};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
