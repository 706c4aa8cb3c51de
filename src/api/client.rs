//! API client for the Virsaa admin endpoints.
//!
//! Every authenticated call goes through `authorized_request`, which
//! attaches the bearer token, transparently recovers from a single
//! access-token expiry, and treats 403 as terminal.

use std::path::Path;
use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, warn};

use crate::auth::SessionManager;
use crate::models::{AccountUser, Author, NewAudiobook, NewAuthor, NewEbook, UserFilter};

use super::error::{extract_message, ADMIN_PRIVILEGES_MESSAGE, SESSION_EXPIRED_MESSAGE};
use super::transport::{ApiRequest, ApiResponse, FormPart, PartValue, RequestBody, Transport};
use super::ApiError;

const AUTHORS_LIST_PATH: &str = "/collections/authors/";
const EBOOKS_CREATE_PATH: &str = "/collections/ebooks/admin_create/";
const AUDIOBOOKS_CREATE_PATH: &str = "/collections/audiobooks/admin_create/";
const AUTHORS_CREATE_PATH: &str = "/collections/authors/admin_create/";

/// Client for authenticated Virsaa API calls. Holds the shared transport
/// and the session manager that owns the tokens.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionManager>) -> Self {
        Self { transport, session }
    }

    /// Issue a request with the current access token, recovering from a
    /// single expiry.
    ///
    /// On 401 the refresh protocol runs exactly once and the request is
    /// replayed once with the minted token; a refresh failure propagates
    /// without a replay. A second 401 on the replayed request forces a
    /// logout instead of another retry. 403 is an authorization failure
    /// that no refresh can repair, so it surfaces immediately. All other
    /// statuses pass through to the caller with the body.
    pub async fn authorized_request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<ApiResponse, ApiError> {
        let token = match self.session.access_token().await {
            Some(token) => token,
            None => self.session.refresh().await?,
        };

        let mut request = ApiRequest::new(method.clone(), path).bearer(&token);
        request.body = body.clone();
        let response = self.transport.execute(request).await?;

        if response.status.as_u16() != 401 {
            return Self::reject_forbidden(response);
        }

        debug!(path, "Access token expired, refreshing");
        let new_token = self.session.refresh_if_stale(Some(&token)).await?;

        let mut replay = ApiRequest::new(method, path).bearer(&new_token);
        replay.body = body;
        let replayed = self.transport.execute(replay).await?;

        if replayed.status.as_u16() == 401 {
            // The freshly minted token was refused too; nothing left to
            // retry with.
            warn!(path, "Replayed request still unauthorized, forcing logout");
            self.session.force_clear().await;
            return Err(ApiError::RefreshRejected(SESSION_EXPIRED_MESSAGE.to_string()));
        }
        Self::reject_forbidden(replayed)
    }

    fn reject_forbidden(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.status.as_u16() == 403 {
            let message = response
                .json_value()
                .as_ref()
                .and_then(extract_message)
                .unwrap_or_else(|| ADMIN_PRIVILEGES_MESSAGE.to_string());
            return Err(ApiError::AccessDenied(message));
        }
        Ok(response)
    }

    /// Shorthand for authenticated requests whose non-success statuses
    /// should become typed errors rather than passing through.
    async fn expect_success(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<ApiResponse, ApiError> {
        let response = self.authorized_request(method, path, body).await?;
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        Ok(response)
    }

    /// Fetch the user list for the given membership filter.
    pub async fn fetch_users(&self, filter: UserFilter) -> Result<Vec<AccountUser>, ApiError> {
        let path = format!("/api/auth/users/{}/", filter.as_str());
        let response = self
            .expect_success(Method::GET, &path, RequestBody::Empty)
            .await?;
        response.json()
    }

    /// Fetch the author catalog, used to resolve author references when
    /// uploading ebooks and audiobooks.
    pub async fn fetch_authors(&self) -> Result<Vec<Author>, ApiError> {
        let response = self
            .expect_success(Method::GET, AUTHORS_LIST_PATH, RequestBody::Empty)
            .await?;
        response.json()
    }

    /// Create an ebook from a JSON payload.
    pub async fn create_ebook(&self, ebook: &NewEbook) -> Result<(), ApiError> {
        self.create_json(EBOOKS_CREATE_PATH, serde_json::to_value(ebook)).await
    }

    /// Create an audiobook from a JSON payload.
    pub async fn create_audiobook(&self, audiobook: &NewAudiobook) -> Result<(), ApiError> {
        self.create_json(AUDIOBOOKS_CREATE_PATH, serde_json::to_value(audiobook))
            .await
    }

    /// Create an author from a JSON payload.
    pub async fn create_author(&self, author: &NewAuthor) -> Result<(), ApiError> {
        self.create_json(AUTHORS_CREATE_PATH, serde_json::to_value(author)).await
    }

    async fn create_json(
        &self,
        path: &str,
        payload: Result<serde_json::Value, serde_json::Error>,
    ) -> Result<(), ApiError> {
        let payload = payload.map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        self.expect_success(Method::POST, path, RequestBody::Json(payload))
            .await?;
        Ok(())
    }

    /// Create an ebook with its cover image and PDF as multipart file
    /// parts, matching the admin upload form.
    pub async fn create_ebook_with_files(
        &self,
        ebook: &NewEbook,
        cover_image: Option<&Path>,
        pdf_file: Option<&Path>,
    ) -> Result<(), ApiError> {
        let mut parts = vec![
            FormPart {
                name: "title".to_string(),
                value: PartValue::Text(ebook.title.clone()),
            },
            FormPart {
                name: "author".to_string(),
                value: PartValue::Text(ebook.author.clone()),
            },
            FormPart {
                name: "rating".to_string(),
                value: PartValue::Text(ebook.rating.to_string()),
            },
        ];
        if let Some(pages) = ebook.pages {
            parts.push(FormPart {
                name: "pages".to_string(),
                value: PartValue::Text(pages.to_string()),
            });
        }
        if let Some(ref description) = ebook.description {
            parts.push(FormPart {
                name: "description".to_string(),
                value: PartValue::Text(description.clone()),
            });
        }
        if let Some(path) = cover_image {
            parts.push(Self::file_part("cover_image", path).await?);
        }
        if let Some(path) = pdf_file {
            parts.push(Self::file_part("pdf_file", path).await?);
        }

        self.expect_success(Method::POST, EBOOKS_CREATE_PATH, RequestBody::Multipart(parts))
            .await?;
        Ok(())
    }

    /// Create an audiobook with its cover image and audio file as
    /// multipart file parts.
    pub async fn create_audiobook_with_files(
        &self,
        audiobook: &NewAudiobook,
        cover_image: Option<&Path>,
        audio_file: Option<&Path>,
    ) -> Result<(), ApiError> {
        let mut parts = vec![
            FormPart {
                name: "title".to_string(),
                value: PartValue::Text(audiobook.title.clone()),
            },
            FormPart {
                name: "author".to_string(),
                value: PartValue::Text(audiobook.author.clone()),
            },
            FormPart {
                name: "rating".to_string(),
                value: PartValue::Text(audiobook.rating.to_string()),
            },
        ];
        if let Some(ref duration) = audiobook.duration {
            parts.push(FormPart {
                name: "duration".to_string(),
                value: PartValue::Text(duration.clone()),
            });
        }
        if let Some(ref format) = audiobook.format {
            parts.push(FormPart {
                name: "format".to_string(),
                value: PartValue::Text(format.clone()),
            });
        }
        if let Some(ref genre) = audiobook.genre {
            parts.push(FormPart {
                name: "genre".to_string(),
                value: PartValue::Text(genre.clone()),
            });
        }
        if let Some(ref description) = audiobook.description {
            parts.push(FormPart {
                name: "description".to_string(),
                value: PartValue::Text(description.clone()),
            });
        }
        if let Some(path) = cover_image {
            parts.push(Self::file_part("cover_image", path).await?);
        }
        if let Some(path) = audio_file {
            parts.push(Self::file_part("audio_file", path).await?);
        }

        self.expect_success(
            Method::POST,
            AUDIOBOOKS_CREATE_PATH,
            RequestBody::Multipart(parts),
        )
        .await?;
        Ok(())
    }

    async fn file_part(name: &str, path: &Path) -> Result<FormPart, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        Ok(FormPart {
            name: name.to_string(),
            value: PartValue::File {
                file_name,
                mime: mime_for(path).to_string(),
                bytes,
            },
        })
    }
}

/// MIME type for an upload, keyed on the file extension. The upload
/// forms accept whatever the admin picked, so unknown extensions fall
/// back to a generic binary type rather than failing.
fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("epub") => "application/epub+zip",
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("m4b") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}
