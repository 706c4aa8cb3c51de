use serde::{Deserialize, Serialize};

/// Author row from `GET /collections/authors/`, used to resolve the
/// author reference when uploading ebooks and audiobooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// Payload for `POST /collections/ebooks/admin_create/`.
///
/// The cover image and PDF travel as multipart file parts when uploading
/// from disk; the JSON form omits them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEbook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub pages: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload for `POST /collections/audiobooks/admin_create/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAudiobook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload for `POST /collections/authors/admin_create/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub born: Option<String>,
    #[serde(default)]
    pub died: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub notable_works: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub awards: Option<String>,
}
