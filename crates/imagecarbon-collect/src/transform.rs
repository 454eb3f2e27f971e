//! Transform backend: uploads originals and builds optimized delivery URLs.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::form_urlencoded;

use crate::error::{CollectError, Result};

/// Host that serves Cloudinary assets.
pub const CLOUDINARY_DELIVERY_HOST: &str = "res.cloudinary.com";

/// Cloudinary upload API base.
pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// What to upload and how to label it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Where the backend fetches the source image from.
    pub source_url: String,
    /// Normalized site the image was found on.
    pub site_url: String,
    /// Folder the asset is stored under.
    pub folder: String,
    /// Tags attached to the asset.
    pub tags: Vec<String>,
}

impl UploadRequest {
    /// Builds a request tagged with the folder name and the site.
    pub fn new(source_url: impl Into<String>, site_url: impl Into<String>, folder: &str) -> Self {
        let site_url = site_url.into();
        Self {
            source_url: source_url.into(),
            tags: vec![folder.to_string(), format!("{}:site:{}", folder, site_url)],
            site_url,
            folder: folder.to_string(),
        }
    }
}

/// An asset stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedAsset {
    #[serde(rename = "public_id")]
    pub id: String,
    pub secure_url: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// An image hosting service that can store an image and serve it re-encoded.
#[async_trait]
pub trait TransformBackend: Send + Sync {
    /// Stores the image at `request.source_url`.
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedAsset>;

    /// URL serving `asset_id` in `format`. No network access.
    fn delivery_url(&self, asset_id: &str, format: &str) -> String;

    /// Host of every delivery URL.
    fn delivery_host(&self) -> &str;

    /// Adjusts a source URL before upload. Identity by default.
    fn prepare_source(&self, source_url: &str, _format: &str) -> String {
        source_url.to_string()
    }
}

/// Cloudinary account credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Signed uploads to Cloudinary.
pub struct CloudinaryBackend {
    client: reqwest::Client,
    credentials: CloudinaryCredentials,
}

impl CloudinaryBackend {
    pub fn new(client: reqwest::Client, credentials: CloudinaryCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    fn upload_endpoint(&self) -> String {
        format!(
            "{}/{}/image/upload",
            CLOUDINARY_API_BASE, self.credentials.cloud_name
        )
    }

    /// Form body of a signed upload at `timestamp`.
    fn upload_form(&self, request: &UploadRequest, timestamp: i64) -> String {
        let context = format!(
            "siteUrl={}|originalUrl={}",
            escape_context(&request.site_url),
            escape_context(&request.source_url)
        );
        let tags = request.tags.join(",");
        let timestamp = timestamp.to_string();

        // Signed parameters, sorted by name
        let signed = [
            ("context", context.as_str()),
            ("folder", request.folder.as_str()),
            ("tags", tags.as_str()),
            ("timestamp", timestamp.as_str()),
        ];
        let signature = sign(&signed, &self.credentials.api_secret);

        form_urlencoded::Serializer::new(String::new())
            .append_pair("file", &request.source_url)
            .append_pair("api_key", &self.credentials.api_key)
            .extend_pairs(signed.iter())
            .append_pair("signature", &signature)
            .append_pair("signature_algorithm", "sha256")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorBody {
    error: CloudinaryErrorMessage,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorMessage {
    message: String,
}

#[async_trait]
impl TransformBackend for CloudinaryBackend {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadedAsset> {
        let body = self.upload_form(request, Utc::now().timestamp());

        let response = self
            .client
            .post(self.upload_endpoint())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<CloudinaryErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(CollectError::Upload(format!(
                "{}: {}",
                request.source_url, message
            )));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn delivery_url(&self, asset_id: &str, format: &str) -> String {
        format!(
            "https://{}/{}/image/upload/f_{},q_auto/{}",
            CLOUDINARY_DELIVERY_HOST, self.credentials.cloud_name, format, asset_id
        )
    }

    fn delivery_host(&self) -> &str {
        CLOUDINARY_DELIVERY_HOST
    }

    fn prepare_source(&self, source_url: &str, format: &str) -> String {
        if is_cloudinary_url(source_url) {
            source_url.replace("f_auto", &format!("f_{}", format))
        } else {
            source_url.to_string()
        }
    }
}

/// Returns true if the URL is served by Cloudinary.
pub fn is_cloudinary_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host == CLOUDINARY_DELIVERY_HOST))
        .unwrap_or(false)
}

/// Cloudinary context values reserve `=` and `|`.
fn escape_context(value: &str) -> String {
    value.replace('=', "\\=").replace('|', "\\|")
}

/// SHA-256 signature over `name=value` pairs joined by `&`, followed by the secret.
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> CloudinaryBackend {
        CloudinaryBackend::new(
            reqwest::Client::new(),
            CloudinaryCredentials {
                cloud_name: "demo".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            },
        )
    }

    #[test]
    fn test_upload_request_tags() {
        let request = UploadRequest::new("https://example.com/a.png", "example.com", "imagecarbon");
        assert_eq!(
            request.tags,
            vec!["imagecarbon", "imagecarbon:site:example.com"]
        );
    }

    #[test]
    fn test_delivery_url() {
        assert_eq!(
            backend().delivery_url("imagecarbon/abc", "avif"),
            "https://res.cloudinary.com/demo/image/upload/f_avif,q_auto/imagecarbon/abc"
        );
        assert_eq!(backend().delivery_host(), "res.cloudinary.com");
    }

    #[test]
    fn test_prepare_source_rewrites_auto_format() {
        let backend = backend();
        assert_eq!(
            backend.prepare_source(
                "https://res.cloudinary.com/other/image/upload/f_auto,q_auto/photo",
                "avif"
            ),
            "https://res.cloudinary.com/other/image/upload/f_avif,q_auto/photo"
        );
        assert_eq!(
            backend.prepare_source("https://example.com/f_auto.png", "avif"),
            "https://example.com/f_auto.png"
        );
    }

    #[test]
    fn test_escape_context() {
        assert_eq!(escape_context("a=b|c"), "a\\=b\\|c");
    }

    #[test]
    fn test_signature_is_stable_hex() {
        let a = sign(&[("folder", "x"), ("timestamp", "1")], "secret");
        let b = sign(&[("folder", "x"), ("timestamp", "1")], "secret");
        let c = sign(&[("folder", "x"), ("timestamp", "2")], "secret");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_upload_form_fields() {
        let request = UploadRequest::new("https://example.com/a.png", "example.com", "imagecarbon");
        let form = backend().upload_form(&request, 1_700_000_000);

        let pairs: Vec<(String, String)> = form_urlencoded::parse(form.as_bytes())
            .into_owned()
            .collect();
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(get("file").as_deref(), Some("https://example.com/a.png"));
        assert_eq!(get("timestamp").as_deref(), Some("1700000000"));
        assert_eq!(
            get("context").as_deref(),
            Some("siteUrl=example.com|originalUrl=https://example.com/a.png")
        );
        assert_eq!(get("signature").map(|s| s.len()), Some(64));
    }

    #[test]
    fn test_uploaded_asset_from_api_json() {
        let asset: UploadedAsset = serde_json::from_str(
            r#"{"public_id":"imagecarbon/abc","secure_url":"https://res.cloudinary.com/demo/image/upload/v1/imagecarbon/abc.png","format":"png","bytes":30000,"width":800,"height":600,"etag":"x"}"#,
        )
        .unwrap();

        assert_eq!(asset.id, "imagecarbon/abc");
        assert_eq!(asset.bytes, Some(30_000));
        assert_eq!(asset.width, Some(800));
    }
}
