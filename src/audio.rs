// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::api::audio_url;
use crate::error::DownloadError;
use crate::events::{ClientEvent, SharedEventReporter};
use crate::filename::generate_filename;
use crate::http::HttpClient;
use crate::models::Episode;

/// Outcome of a finished audio download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    /// Final location of the audio file
    pub path: PathBuf,
    pub bytes_downloaded: u64,
    /// Hex SHA-256 of the content, prefixed with "sha256:"
    pub content_hash: String,
}

/// Download an episode's audio into `output_dir`.
///
/// The body is streamed into a `.partial` file which is renamed once the
/// transfer completes, so an interrupted download never looks finished.
pub async fn download_audio<C: HttpClient>(
    client: &C,
    base_url: &str,
    episode: &Episode,
    output_dir: &Path,
    reporter: &SharedEventReporter,
) -> Result<DownloadResult, DownloadError> {
    let result = stream_to_disk(client, base_url, episode, output_dir, reporter).await;

    match &result {
        Ok(done) => reporter.report(ClientEvent::DownloadCompleted {
            episode_title: episode.title.clone(),
            bytes_downloaded: done.bytes_downloaded,
            hash: done.content_hash.clone(),
        }),
        Err(e) => {
            tracing::warn!(episode_id = %episode.id, error = %e, "audio download failed");
            reporter.report(ClientEvent::DownloadFailed {
                episode_title: episode.title.clone(),
                error: e.to_string(),
            });
        }
    }

    result
}

async fn stream_to_disk<C: HttpClient>(
    client: &C,
    base_url: &str,
    episode: &Episode,
    output_dir: &Path,
    reporter: &SharedEventReporter,
) -> Result<DownloadResult, DownloadError> {
    let url = audio_url(base_url, &episode.audio_file)?.to_string();

    let response = client
        .get_stream(&url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.clone(),
            source: e,
        })?;

    if response.status >= 400 {
        return Err(DownloadError::HttpStatus {
            url,
            status: response.status,
        });
    }

    let content_length = response.content_length;
    reporter.report(ClientEvent::DownloadStarting {
        episode_title: episode.title.clone(),
        content_length,
    });

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let output_path = output_dir.join(generate_filename(episode));
    let partial_path = output_path.with_extension(format!(
        "{}.partial",
        output_path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    let mut file =
        File::create(&partial_path)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: partial_path.clone(),
                source: e,
            })?;

    let mut hasher = Sha256::new();
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    let streamed: Result<(), DownloadError> = async {
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
                url: url.clone(),
                source: e,
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: partial_path.clone(),
                    source: e,
                })?;

            hasher.update(&chunk);
            bytes_downloaded += chunk.len() as u64;

            reporter.report(ClientEvent::DownloadProgress {
                episode_title: episode.title.clone(),
                bytes_downloaded,
                total_bytes: content_length,
            });
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial_path.clone(),
                source: e,
            })
    }
    .await;

    drop(file);
    if let Err(e) = streamed {
        let _ = tokio::fs::remove_file(&partial_path).await;
        return Err(e);
    }

    tokio::fs::rename(&partial_path, &output_path)
        .await
        .map_err(|e| DownloadError::FileRenameFailed {
            from: partial_path.clone(),
            to: output_path.clone(),
            source: e,
        })?;

    Ok(DownloadResult {
        path: output_path,
        bytes_downloaded,
        content_hash: format!("sha256:{:x}", hasher.finalize()),
    })
}
