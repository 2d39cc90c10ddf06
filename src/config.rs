use std::path::{Path, PathBuf};

use url::Url;

/// API location used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8001";

/// Environment variable overriding the API location
pub const API_URL_ENV: &str = "PODHUB_API_URL";

/// Environment variable overriding the session file location
pub const TOKEN_FILE_ENV: &str = "PODHUB_TOKEN_FILE";

const SESSION_DIR: &str = ".podhub";
const SESSION_FILE: &str = "session.json";

/// Where the client talks to and where it keeps its session
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub token_file: PathBuf,
}

impl ClientConfig {
    /// Build a config, falling back to the default session file when none is given
    pub fn new(base_url: &str, token_file: Option<PathBuf>) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(base_url)?;
        let token_file = token_file.unwrap_or_else(|| {
            default_token_file(std::env::var_os("HOME").as_deref().map(Path::new))
        });

        Ok(Self {
            base_url,
            token_file,
        })
    }

    /// Base URL without a trailing slash, ready for path concatenation
    pub fn api_base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

/// `~/.podhub/session.json`, or a dotfile in the working directory without a home
pub fn default_token_file(home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) => home.join(SESSION_DIR).join(SESSION_FILE),
        None => PathBuf::from(".podhub-session.json"),
    }
}
