//! Two-step media download from the Graph API.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::MediaError;
use crate::media::mime::extension_for_mime;

const FALLBACK_MIME: &str = "application/octet-stream";

/// A downloaded attachment.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
    pub size: u64,
    /// Provider-reported digest, if any. Informational only.
    pub sha256: Option<String>,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        media_id: &str,
        access_token: &SecretString,
    ) -> Result<FetchedMedia, MediaError>;
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    url: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
}

/// Fetches media through `GET {api_root}/{media_id}` then `GET {url}`.
pub struct GraphMediaFetcher {
    client: reqwest::Client,
    api_root: String,
}

impl GraphMediaFetcher {
    /// `api_root` is `{graph_base_url}/{api_version}`.
    pub fn new(client: reqwest::Client, api_root: impl Into<String>) -> Self {
        Self {
            client,
            api_root: api_root.into().trim_end_matches('/').to_string(),
        }
    }

    async fn metadata(
        &self,
        media_id: &str,
        bearer: &str,
    ) -> Result<MediaMetadata, MediaError> {
        let url = format!("{}/{}", self.api_root, media_id);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(|e| MediaError::Metadata {
                media_id: media_id.to_string(),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Err(MediaError::Unavailable {
                media_id: media_id.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(MediaError::Metadata {
                media_id: media_id.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        response
            .json::<MediaMetadata>()
            .await
            .map_err(|e| MediaError::Metadata {
                media_id: media_id.to_string(),
                reason: format!("undecodable metadata: {}", e.without_url()),
            })
    }
}

#[async_trait]
impl MediaFetcher for GraphMediaFetcher {
    #[instrument(skip(self, access_token), fields(media_id = %media_id))]
    async fn fetch(
        &self,
        media_id: &str,
        access_token: &SecretString,
    ) -> Result<FetchedMedia, MediaError> {
        let bearer = format!("Bearer {}", access_token.expose_secret());
        let meta = self.metadata(media_id, &bearer).await?;

        let download_error = |reason: String| MediaError::Download {
            media_id: media_id.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&meta.url)
            .header(AUTHORIZATION, &bearer)
            .send()
            .await
            .map_err(|e| download_error(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status().as_u16())));
        }

        let header_mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let disposition_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.without_url().to_string()))?
            .to_vec();

        let mime_type = meta
            .mime_type
            .filter(|m| !m.is_empty())
            .or(header_mime)
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        let filename = disposition_name.unwrap_or_else(|| match extension_for_mime(&mime_type) {
            Some(ext) => format!("{}.{}", media_id, ext),
            None => media_id.to_string(),
        });

        debug!(size = bytes.len(), mime_type = %mime_type, "Media downloaded");

        Ok(FetchedMedia {
            size: bytes.len() as u64,
            bytes,
            mime_type,
            filename,
            sha256: meta.sha256,
        })
    }
}

/// Extracts the filename from a `Content-Disposition` header value.
/// Handles `filename="a b.pdf"`, `filename=a.pdf` and RFC 5987
/// `filename*=UTF-8''a%20b.pdf` (which wins when both are present).
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in value.split(';').map(str::trim) {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.trim().splitn(3, '\'').nth(2).unwrap_or(raw.trim());
                extended = Some(percent_decode(encoded));
            }
            "filename" => {
                plain = Some(raw.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| {
            // Only keep the final path component.
            name.rsplit(['/', '\\']).next().unwrap_or("").to_string()
        })
        .filter(|name| !name.is_empty())
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SecretString {
        SecretString::from("test-token")
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="report 2024.pdf""#).as_deref(),
            Some("report 2024.pdf")
        );
        assert_eq!(
            filename_from_disposition("inline; filename=a.jpg").as_deref(),
            Some("a.jpg")
        );
        assert_eq!(
            filename_from_disposition(
                "attachment; filename=\"fallback.txt\"; filename*=UTF-8''na%C3%AFve.txt"
            )
            .as_deref(),
            Some("naïve.txt")
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("passwd")
        );
        assert_eq!(filename_from_disposition("attachment"), None);
    }

    #[tokio::test]
    async fn test_fetch_two_steps() {
        let mut server = mockito::Server::new_async().await;
        let download_url = format!("{}/download/m1", server.url());

        let _meta = server
            .mock("GET", "/v18.0/m1")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"url":"{}","mime_type":"image/jpeg","sha256":"abc","file_size":4,"id":"m1"}}"#,
                download_url
            ))
            .create_async()
            .await;
        let _blob = server
            .mock("GET", "/download/m1")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body(vec![1u8, 2, 3, 4])
            .create_async()
            .await;

        let fetcher =
            GraphMediaFetcher::new(reqwest::Client::new(), format!("{}/v18.0", server.url()));
        let media = fetcher.fetch("m1", &token()).await.unwrap();

        assert_eq!(media.bytes, vec![1, 2, 3, 4]);
        assert_eq!(media.size, 4);
        assert_eq!(media.mime_type, "image/jpeg");
        assert_eq!(media.filename, "m1.jpg");
        assert_eq!(media.sha256.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_fetch_uses_disposition_filename() {
        let mut server = mockito::Server::new_async().await;
        let download_url = format!("{}/download/d1", server.url());

        let _meta = server
            .mock("GET", "/v18.0/d1")
            .with_status(200)
            .with_body(format!(r#"{{"url":"{}","mime_type":"application/pdf"}}"#, download_url))
            .create_async()
            .await;
        let _blob = server
            .mock("GET", "/download/d1")
            .with_status(200)
            .with_header("content-disposition", r#"attachment; filename="invoice.pdf""#)
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let fetcher =
            GraphMediaFetcher::new(reqwest::Client::new(), format!("{}/v18.0", server.url()));
        let media = fetcher.fetch("d1", &token()).await.unwrap();
        assert_eq!(media.filename, "invoice.pdf");
    }

    #[tokio::test]
    async fn test_not_found_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _meta = server
            .mock("GET", "/v18.0/gone")
            .with_status(404)
            .with_body(r#"{"error":{"message":"Unsupported get request"}}"#)
            .create_async()
            .await;

        let fetcher =
            GraphMediaFetcher::new(reqwest::Client::new(), format!("{}/v18.0", server.url()));
        let err = fetcher.fetch("gone", &token()).await.unwrap_err();
        assert!(matches!(err, MediaError::Unavailable { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_forbidden_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _meta = server
            .mock("GET", "/v18.0/m2")
            .with_status(403)
            .create_async()
            .await;

        let fetcher =
            GraphMediaFetcher::new(reqwest::Client::new(), format!("{}/v18.0", server.url()));
        let err = fetcher.fetch("m2", &token()).await.unwrap_err();
        assert!(matches!(err, MediaError::Unavailable { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_metadata_failure() {
        let mut server = mockito::Server::new_async().await;
        let _meta = server
            .mock("GET", "/v18.0/m3")
            .with_status(500)
            .create_async()
            .await;

        let fetcher =
            GraphMediaFetcher::new(reqwest::Client::new(), format!("{}/v18.0", server.url()));
        let err = fetcher.fetch("m3", &token()).await.unwrap_err();
        assert!(matches!(err, MediaError::Metadata { .. }));
    }

    #[tokio::test]
    async fn test_download_failure_after_metadata() {
        let mut server = mockito::Server::new_async().await;
        let download_url = format!("{}/download/m4", server.url());
        let _meta = server
            .mock("GET", "/v18.0/m4")
            .with_status(200)
            .with_body(format!(r#"{{"url":"{}","mime_type":"video/mp4"}}"#, download_url))
            .create_async()
            .await;
        let _blob = server
            .mock("GET", "/download/m4")
            .with_status(500)
            .create_async()
            .await;

        let fetcher =
            GraphMediaFetcher::new(reqwest::Client::new(), format!("{}/v18.0", server.url()));
        let err = fetcher.fetch("m4", &token()).await.unwrap_err();
        assert!(matches!(err, MediaError::Download { .. }));
    }
}
