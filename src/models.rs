// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Audio formats the upload endpoint accepts
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg"];

/// Account type chosen at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Listener,
    Podcaster,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Listener => f.write_str("listener"),
            Role::Podcaster => f.write_str("podcaster"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "listener" => Ok(Role::Listener),
            "podcaster" => Ok(Role::Podcaster),
            other => Err(format!(
                "unknown role '{other}' (expected 'listener' or 'podcaster')"
            )),
        }
    }
}

/// The authenticated account as returned by the auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id::deserialize")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub username: String,
    pub role: Role,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
}

impl User {
    pub fn is_podcaster(&self) -> bool {
        self.role == Role::Podcaster
    }
}

/// A podcast show owned by one podcaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    #[serde(deserialize_with = "id::deserialize")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
}

/// A single uploaded episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(deserialize_with = "id::deserialize")]
    pub id: String,
    #[serde(default)]
    pub podcast_id: String,
    pub title: String,
    pub description: String,
    /// Stored filename on the server, served under `/api/uploads/`
    pub audio_file: String,
    /// Duration in seconds, when the server knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
}

/// Matches returned by the search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub podcasts: Vec<Podcast>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.podcasts.is_empty() && self.episodes.is_empty()
    }
}

/// Successful login payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: User,
}

/// Login form
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

/// Registration form
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl Registration {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("email", &self.email)?;
        require("username", &self.username)?;
        require("password", &self.password)
    }
}

/// Dashboard form for creating a podcast
#[derive(Debug, Clone, Serialize)]
pub struct NewPodcast {
    pub title: String,
    pub description: String,
    pub category: String,
}

impl NewPodcast {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("title", &self.title)?;
        require("description", &self.description)?;
        require("category", &self.category)
    }
}

/// An audio file picked for upload
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub filename: String,
    pub data: Bytes,
}

impl AudioFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }

    /// Read an audio file from disk, keeping only its final path component as name
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        Ok(Self::new(filename, data))
    }

    /// Lowercased extension, taken after the last dot
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            Some("ogg") => "audio/ogg",
            _ => "application/octet-stream",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let extension = self.extension().unwrap_or_default();
        if !SUPPORTED_AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ValidationError::UnsupportedAudioFormat { extension });
        }
        if self.data.is_empty() {
            return Err(ValidationError::EmptyAudioFile {
                filename: self.filename.clone(),
            });
        }
        Ok(())
    }
}

/// Dashboard form for uploading an episode
#[derive(Debug, Clone)]
pub struct NewEpisode {
    pub title: String,
    pub description: String,
    pub audio: Option<AudioFile>,
}

impl NewEpisode {
    /// Validate the form, returning the audio file it will upload
    pub fn validate(&self) -> Result<&AudioFile, ValidationError> {
        require("title", &self.title)?;
        require("description", &self.description)?;
        let audio = self.audio.as_ref().ok_or(ValidationError::MissingAudioFile)?;
        audio.validate()?;
        Ok(audio)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Identifiers arrive as UUID strings, but plain integers are accepted too
mod id {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        })
    }
}

/// The server emits naive UTC timestamps; offsets are tolerated and normalized
mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, de::Error};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };

        if let Ok(naive) = raw.parse::<NaiveDateTime>() {
            return Ok(Some(naive));
        }

        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.naive_utc()))
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}
