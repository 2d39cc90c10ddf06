// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content operations against the PodcastHub API.
//!
//! Every call goes straight to the server; nothing is cached between calls.
//! Endpoints that need an account take the session controller, which stamps
//! its current credential onto the request.

use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{ApiError, ValidationError};
use crate::http::{ApiRequest, FilePart, HttpClient, MultipartForm};
use crate::models::{Episode, NewEpisode, NewPodcast, Podcast, SearchResults};
use crate::session::SessionController;
use crate::storage::TokenStore;

/// Multipart field name the upload endpoint expects the audio under
const AUDIO_FIELD: &str = "audio_file";

/// Everything but RFC 3986 unreserved characters is escaped inside a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode a resource id as exactly one path segment.
///
/// Dot segments are refused outright since URL parsers resolve them even
/// when percent-encoded.
fn id_segment(field: &'static str, id: &str) -> Result<String, ValidationError> {
    match id {
        "" => Err(ValidationError::MissingField(field)),
        "." | ".." => Err(ValidationError::InvalidIdentifier {
            field,
            value: id.to_string(),
        }),
        _ => Ok(utf8_percent_encode(id, PATH_SEGMENT).to_string()),
    }
}

/// Send a request and return the body of a successful response
pub(crate) async fn execute<C: HttpClient + ?Sized>(
    client: &C,
    request: ApiRequest,
) -> Result<Bytes, ApiError> {
    let path = request.path.clone();
    let response = client
        .send(request)
        .await
        .map_err(|e| ApiError::Transport {
            path: path.clone(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(ApiError::Status {
            path,
            status: response.status,
            detail: error_detail(&response.body),
        });
    }

    Ok(response.body)
}

/// Send a request and decode the JSON body of a successful response
pub(crate) async fn fetch_json<C: HttpClient + ?Sized, T: DeserializeOwned>(
    client: &C,
    request: ApiRequest,
) -> Result<T, ApiError> {
    let path = request.path.clone();
    let body = execute(client, request).await?;
    serde_json::from_slice(&body).map_err(|e| ApiError::Decode { path, source: e })
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, validation lists of the form
/// `{"detail": [{"msg": "..."}]}` and `{"error": "..."}`.
pub fn error_detail(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Detail {
        Text(String),
        Items(Vec<DetailItem>),
    }

    #[derive(Deserialize)]
    struct DetailItem {
        msg: String,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Option<Detail>,
        error: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    let message = match parsed.detail {
        Some(Detail::Text(text)) => Some(text),
        Some(Detail::Items(items)) if !items.is_empty() => Some(
            items
                .into_iter()
                .map(|item| item.msg)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => parsed.error,
    };

    message.filter(|m| !m.trim().is_empty())
}

/// Log a failed content fetch and pass the error on
fn logged<T>(operation: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    if let Err(e) = &result {
        tracing::warn!(operation, error = %e, "content request failed");
    }
    result
}

/// Check that the API is reachable, returning its greeting
pub async fn health<C: HttpClient>(client: &C) -> Result<String, ApiError> {
    #[derive(Deserialize)]
    struct Greeting {
        message: String,
    }

    let greeting: Greeting = fetch_json(client, ApiRequest::get("/")).await?;
    Ok(greeting.message)
}

/// All podcasts on the platform
pub async fn list_podcasts<C: HttpClient>(client: &C) -> Result<Vec<Podcast>, ApiError> {
    logged(
        "list_podcasts",
        fetch_json(client, ApiRequest::get("/api/podcasts")).await,
    )
}

/// Podcasts owned by the logged-in podcaster
pub async fn my_podcasts<C: HttpClient, S: TokenStore>(
    client: &C,
    session: &SessionController<S>,
) -> Result<Vec<Podcast>, ApiError> {
    let request = session.authorize(ApiRequest::get("/api/podcasts/my"))?;
    logged("my_podcasts", fetch_json(client, request).await)
}

/// A single podcast by id
pub async fn get_podcast<C: HttpClient>(client: &C, podcast_id: &str) -> Result<Podcast, ApiError> {
    let podcast_id = id_segment("podcast_id", podcast_id)?;
    let request = ApiRequest::get(format!("/api/podcasts/{podcast_id}"));
    logged("get_podcast", fetch_json(client, request).await)
}

/// Create a podcast owned by the logged-in podcaster
pub async fn create_podcast<C: HttpClient, S: TokenStore>(
    client: &C,
    session: &SessionController<S>,
    podcast: &NewPodcast,
) -> Result<Podcast, ApiError> {
    podcast.validate()?;

    let body = serde_json::to_value(podcast).map_err(|e| ApiError::Encode {
        path: "/api/podcasts".to_string(),
        source: e,
    })?;
    let request = session.authorize(ApiRequest::post("/api/podcasts").json(body))?;

    let created: Podcast = logged("create_podcast", fetch_json(client, request).await)?;
    tracing::info!(podcast_id = %created.id, title = %created.title, "created podcast");
    Ok(created)
}

/// Episodes of one podcast
pub async fn list_episodes<C: HttpClient>(
    client: &C,
    podcast_id: &str,
) -> Result<Vec<Episode>, ApiError> {
    let podcast_id = id_segment("podcast_id", podcast_id)?;
    let request = ApiRequest::get(format!("/api/podcasts/{podcast_id}/episodes"));
    logged("list_episodes", fetch_json(client, request).await)
}

/// Every episode on the platform
pub async fn all_episodes<C: HttpClient>(client: &C) -> Result<Vec<Episode>, ApiError> {
    logged(
        "all_episodes",
        fetch_json(client, ApiRequest::get("/api/episodes")).await,
    )
}

/// A single episode by id
pub async fn get_episode<C: HttpClient>(client: &C, episode_id: &str) -> Result<Episode, ApiError> {
    let episode_id = id_segment("episode_id", episode_id)?;
    let request = ApiRequest::get(format!("/api/episodes/{episode_id}"));
    logged("get_episode", fetch_json(client, request).await)
}

/// Upload a new episode to a podcast owned by the logged-in podcaster.
///
/// The form is validated first; a missing or unsupported audio file never
/// leaves the client.
pub async fn upload_episode<C: HttpClient, S: TokenStore>(
    client: &C,
    session: &SessionController<S>,
    podcast_id: &str,
    episode: &NewEpisode,
) -> Result<Episode, ApiError> {
    let audio = episode.validate()?;
    let segment = id_segment("podcast_id", podcast_id)?;

    let form = MultipartForm::new()
        .text("title", episode.title.clone())
        .text("description", episode.description.clone())
        .file(FilePart {
            field: AUDIO_FIELD.to_string(),
            filename: audio.filename.clone(),
            mime_type: audio.mime_type().to_string(),
            data: audio.data.clone(),
        });

    let path = format!("/api/podcasts/{segment}/episodes");
    let request = session.authorize(ApiRequest::post(path).multipart(form))?;

    tracing::debug!(podcast_id, bytes = audio.data.len(), "uploading episode");
    let created: Episode = logged("upload_episode", fetch_json(client, request).await)?;
    tracing::info!(episode_id = %created.id, title = %created.title, "uploaded episode");
    Ok(created)
}

/// Search podcasts (title, description, category) and episodes (title, description)
pub async fn search<C: HttpClient>(client: &C, query: &str) -> Result<SearchResults, ApiError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ValidationError::MissingField("query").into());
    }

    let request = ApiRequest::get("/api/search").query("q", query);
    logged("search", fetch_json(client, request).await)
}

/// Public URL of an uploaded audio file
pub fn audio_url(base_url: &str, audio_file: &str) -> Result<Url, ApiError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(["api", "uploads", audio_file]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopReporter;
    use crate::http::RequestBody;
    use crate::http::mock::MockHttpClient;
    use crate::models::AudioFile;
    use crate::storage::MemoryTokenStore;
    use reqwest::Method;
    use serde_json::json;

    fn podcast_json(id: &str, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "description": "Talk about things",
            "category": "Technology",
            "creator_id": "u1",
            "cover_image": null,
            "created_at": "2024-01-15T12:00:00"
        })
    }

    fn episode_json(id: &str, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "podcast_id": "p1",
            "title": title,
            "description": "An episode",
            "audio_file": "abc.mp3",
            "duration": null,
            "created_at": "2024-01-16T08:00:00"
        })
    }

    async fn logged_in(client: &MockHttpClient) -> SessionController<MemoryTokenStore> {
        let mut session = SessionController::new(MemoryTokenStore::new(), NoopReporter::shared());
        session.login(client, "pod@example.com", "pw").await.unwrap();
        session
    }

    fn with_login(client: MockHttpClient) -> MockHttpClient {
        client.respond(
            Method::POST,
            "/api/auth/login",
            200,
            json!({
                "access_token": "T1",
                "token_type": "bearer",
                "user": {"id": "u1", "username": "caster", "role": "podcaster"}
            }),
        )
    }

    #[test]
    fn error_detail_reads_string_detail() {
        assert_eq!(
            error_detail(br#"{"detail":"Invalid credentials"}"#),
            Some("Invalid credentials".to_string())
        );
    }

    #[test]
    fn error_detail_joins_validation_messages() {
        let body = br#"{"detail":[{"loc":["body","email"],"msg":"field required"},
                                  {"loc":["body","role"],"msg":"field required"}]}"#;
        assert_eq!(
            error_detail(body),
            Some("field required; field required".to_string())
        );
    }

    #[test]
    fn error_detail_falls_back_to_error_key() {
        assert_eq!(
            error_detail(br#"{"error":"User already exists"}"#),
            Some("User already exists".to_string())
        );
    }

    #[test]
    fn error_detail_ignores_unparseable_bodies() {
        assert_eq!(error_detail(b"<html>502</html>"), None);
        assert_eq!(error_detail(br#"{"detail":""}"#), None);
        assert_eq!(error_detail(br#"{"other":1}"#), None);
    }

    #[tokio::test]
    async fn list_podcasts_is_public() {
        let client = MockHttpClient::new().respond(
            Method::GET,
            "/api/podcasts",
            200,
            json!([podcast_json("p1", "One"), podcast_json("p2", "Two")]),
        );

        let podcasts = list_podcasts(&client).await.unwrap();

        assert_eq!(podcasts.len(), 2);
        assert_eq!(podcasts[1].title, "Two");
        assert!(client.last_request().unwrap().bearer.is_none());
    }

    #[tokio::test]
    async fn my_podcasts_requires_login() {
        let client = MockHttpClient::new();
        let session = SessionController::new(MemoryTokenStore::new(), NoopReporter::shared());

        let result = my_podcasts(&client, &session).await;

        assert!(matches!(result, Err(ApiError::NotAuthenticated)));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn my_podcasts_sends_bearer() {
        let client = with_login(MockHttpClient::new()).respond(
            Method::GET,
            "/api/podcasts/my",
            200,
            json!([podcast_json("p1", "Mine")]),
        );
        let session = logged_in(&client).await;

        let podcasts = my_podcasts(&client, &session).await.unwrap();

        assert_eq!(podcasts[0].title, "Mine");
        assert_eq!(client.last_request().unwrap().bearer.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn forbidden_listener_gets_status_error() {
        let client = with_login(MockHttpClient::new()).respond(
            Method::GET,
            "/api/podcasts/my",
            403,
            json!({"detail": "Only podcasters can view their podcasts"}),
        );
        let session = logged_in(&client).await;

        let err = my_podcasts(&client, &session).await.unwrap_err();

        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("Only podcasters"));
    }

    #[tokio::test]
    async fn create_podcast_posts_json() {
        let client = with_login(MockHttpClient::new()).respond(
            Method::POST,
            "/api/podcasts",
            200,
            podcast_json("p9", "Fresh"),
        );
        let session = logged_in(&client).await;
        let form = NewPodcast {
            title: "Fresh".to_string(),
            description: "Talk about things".to_string(),
            category: "Technology".to_string(),
        };

        let created = create_podcast(&client, &session, &form).await.unwrap();

        assert_eq!(created.id, "p9");
        let request = client.last_request().unwrap();
        assert_eq!(request.bearer.as_deref(), Some("T1"));
        assert_eq!(
            request.body,
            RequestBody::Json(json!({
                "title": "Fresh",
                "description": "Talk about things",
                "category": "Technology"
            }))
        );
    }

    #[tokio::test]
    async fn create_podcast_validates_before_sending() {
        let client = with_login(MockHttpClient::new());
        let session = logged_in(&client).await;
        let sent_before = client.requests().len();
        let form = NewPodcast {
            title: "".to_string(),
            description: "x".to_string(),
            category: "y".to_string(),
        };

        let err = create_podcast(&client, &session, &form).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::MissingField("title"))
        ));
        assert_eq!(client.requests().len(), sent_before);
    }

    #[tokio::test]
    async fn upload_episode_sends_multipart() {
        let client = with_login(MockHttpClient::new()).respond(
            Method::POST,
            "/api/podcasts/p1/episodes",
            200,
            episode_json("e1", "Pilot"),
        );
        let session = logged_in(&client).await;
        let form = NewEpisode {
            title: "Pilot".to_string(),
            description: "An episode".to_string(),
            audio: Some(AudioFile::new("pilot.mp3", b"ID3 audio".to_vec())),
        };

        let created = upload_episode(&client, &session, "p1", &form).await.unwrap();

        assert_eq!(created.audio_file, "abc.mp3");
        let request = client.last_request().unwrap();
        let RequestBody::Multipart(sent) = request.body else {
            panic!("expected multipart body");
        };
        assert_eq!(sent.field("title"), Some("Pilot"));
        assert_eq!(sent.field("description"), Some("An episode"));
        let file = sent.file.unwrap();
        assert_eq!(file.field, "audio_file");
        assert_eq!(file.filename, "pilot.mp3");
        assert_eq!(file.mime_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn upload_without_audio_never_dispatches() {
        let client = with_login(MockHttpClient::new());
        let session = logged_in(&client).await;
        let sent_before = client.requests().len();
        let form = NewEpisode {
            title: "Pilot".to_string(),
            description: "An episode".to_string(),
            audio: None,
        };

        let err = upload_episode(&client, &session, "p1", &form)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::MissingAudioFile)
        ));
        assert_eq!(client.requests().len(), sent_before);
    }

    #[tokio::test]
    async fn upload_rejects_unsupported_format() {
        let client = with_login(MockHttpClient::new());
        let session = logged_in(&client).await;
        let form = NewEpisode {
            title: "Pilot".to_string(),
            description: "An episode".to_string(),
            audio: Some(AudioFile::new("pilot.m4a", b"data".to_vec())),
        };

        let err = upload_episode(&client, &session, "p1", &form)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::UnsupportedAudioFormat { .. })
        ));
    }

    #[tokio::test]
    async fn episodes_by_podcast_and_all() {
        let client = MockHttpClient::new()
            .respond(
                Method::GET,
                "/api/podcasts/p1/episodes",
                200,
                json!([episode_json("e1", "Pilot")]),
            )
            .respond(
                Method::GET,
                "/api/episodes",
                200,
                json!([episode_json("e1", "Pilot"), episode_json("e2", "Second")]),
            )
            .respond(Method::GET, "/api/episodes/e2", 200, episode_json("e2", "Second"));

        assert_eq!(list_episodes(&client, "p1").await.unwrap().len(), 1);
        assert_eq!(all_episodes(&client).await.unwrap().len(), 2);
        assert_eq!(get_episode(&client, "e2").await.unwrap().title, "Second");
    }

    #[tokio::test]
    async fn missing_podcast_is_not_found() {
        let client = MockHttpClient::new();
        let err = get_podcast(&client, "nope").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn search_encodes_query() {
        let client = MockHttpClient::new().respond(
            Method::GET,
            "/api/search",
            200,
            json!({"podcasts": [podcast_json("p1", "Rust Talk")], "episodes": []}),
        );

        let results = search(&client, "  rust talk ").await.unwrap();

        assert_eq!(results.podcasts.len(), 1);
        let request = client.last_request().unwrap();
        assert_eq!(
            request.query,
            vec![("q".to_string(), "rust talk".to_string())]
        );
    }

    #[tokio::test]
    async fn blank_search_is_rejected() {
        let client = MockHttpClient::new();
        assert!(search(&client, "   ").await.is_err());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_decode_error() {
        let client = MockHttpClient::new().respond_raw(Method::GET, "/api/podcasts", 200, "[{");
        assert!(matches!(
            list_podcasts(&client).await,
            Err(ApiError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let client = MockHttpClient::new().unreachable(Method::GET, "/api/episodes");
        assert!(matches!(
            all_episodes(&client).await,
            Err(ApiError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn health_returns_greeting() {
        let client = MockHttpClient::new().respond(
            Method::GET,
            "/",
            200,
            json!({"message": "PodcastHub API is running!"}),
        );
        assert_eq!(health(&client).await.unwrap(), "PodcastHub API is running!");
    }

    #[tokio::test]
    async fn ids_stay_inside_their_path_segment() {
        let client = MockHttpClient::new().respond(
            Method::GET,
            "/api/episodes/x%2F..%2F..%2Fpodcasts%2Fmy",
            200,
            episode_json("e1", "Pilot"),
        );

        get_episode(&client, "x/../../podcasts/my").await.unwrap();

        let request = client.last_request().unwrap();
        let resolved = Url::parse(&request.url("http://localhost:8001")).unwrap();
        assert_eq!(resolved.path(), "/api/episodes/x%2F..%2F..%2Fpodcasts%2Fmy");
    }

    #[tokio::test]
    async fn query_characters_in_ids_are_escaped() {
        let client = MockHttpClient::new();

        let _ = get_podcast(&client, "p1?admin=1#x").await;
        let _ = list_episodes(&client, "a b").await;

        let paths: Vec<String> = client.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec![
                "/api/podcasts/p1%3Fadmin%3D1%23x".to_string(),
                "/api/podcasts/a%20b/episodes".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn dot_segment_ids_never_dispatch() {
        let client = MockHttpClient::new();

        let err = get_episode(&client, "..").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidIdentifier { field: "episode_id", .. })
        ));
        assert!(matches!(
            get_podcast(&client, "").await,
            Err(ApiError::Validation(ValidationError::MissingField("podcast_id")))
        ));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn upload_escapes_podcast_id_before_sending_credential() {
        let client = with_login(MockHttpClient::new());
        let session = logged_in(&client).await;
        let form = NewEpisode {
            title: "Pilot".to_string(),
            description: "An episode".to_string(),
            audio: Some(AudioFile::new("pilot.mp3", b"ID3 audio".to_vec())),
        };

        let _ = upload_episode(&client, &session, "p1/../../auth/me", &form).await;

        let request = client.last_request().unwrap();
        assert_eq!(request.path, "/api/podcasts/p1%2F..%2F..%2Fauth%2Fme/episodes");
        assert_eq!(request.bearer.as_deref(), Some("T1"));
    }

    #[test]
    fn audio_url_points_at_uploads() {
        let url = audio_url("http://localhost:8001", "abc.mp3").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8001/api/uploads/abc.mp3");

        let prefixed = audio_url("https://example.com/hub/", "a b.ogg").unwrap();
        assert_eq!(
            prefixed.as_str(),
            "https://example.com/hub/api/uploads/a%20b.ogg"
        );
    }
}
