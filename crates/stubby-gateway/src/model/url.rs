use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchShortenItem {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchShortenResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// One entry of the caller's URL listing; `short_url` is the full public URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrlResponse {
    pub short_url: String,
    pub original_url: String,
}
