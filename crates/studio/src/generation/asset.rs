//! Source images and generated artifacts.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use super::error::GenerationError;

/// MIME type assumed when the upload does not say.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// An uploaded image, as raw base64 or a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAsset {
    mime_type: String,
    data: String,
}

impl SourceAsset {
    /// Parse an upload.
    ///
    /// Accepts `data:<mime>;base64,<payload>` or a bare base64 payload.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::InvalidAsset` if the payload is empty or not
    /// valid base64.
    pub fn parse(input: &str) -> Result<Self, GenerationError> {
        let input = input.trim();
        let (mime_type, data) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| GenerationError::InvalidAsset("malformed data URL".into()))?;
                let mime = header.split(';').next().unwrap_or_default();
                let mime = if mime.is_empty() { DEFAULT_MIME_TYPE } else { mime };
                (mime.to_string(), payload)
            }
            None => (DEFAULT_MIME_TYPE.to_string(), input),
        };

        if data.is_empty() {
            return Err(GenerationError::InvalidAsset("image is empty".into()));
        }
        STANDARD
            .decode(data)
            .map_err(|e| GenerationError::InvalidAsset(format!("image is not valid base64: {e}")))?;

        Ok(Self {
            mime_type,
            data: data.to_string(),
        })
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without any `data:` prefix.
    #[must_use]
    pub fn base64(&self) -> &str {
        &self.data
    }
}

/// A generated result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// Inline image, base64-encoded.
    Image { mime_type: String, data: String },
    /// Video hosted by the provider.
    Video { url: String },
}

impl Artifact {
    /// Browser-ready URL for the artifact.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        match self {
            Self::Image { mime_type, data } => format!("data:{mime_type};base64,{data}"),
            Self::Video { url } => url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_url() {
        let asset = SourceAsset::parse("data:image/jpeg;base64,aGVsbG8=").expect("parse");
        assert_eq!(asset.mime_type(), "image/jpeg");
        assert_eq!(asset.base64(), "aGVsbG8=");
    }

    #[test]
    fn test_parse_raw_base64() {
        let asset = SourceAsset::parse("aGVsbG8=").expect("parse");
        assert_eq!(asset.mime_type(), DEFAULT_MIME_TYPE);
        assert_eq!(asset.base64(), "aGVsbG8=");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SourceAsset::parse("").is_err());
        assert!(SourceAsset::parse("data:image/png;base64,").is_err());
        assert!(SourceAsset::parse("data:image/png;base64").is_err());
        assert!(SourceAsset::parse("not base64 !!").is_err());
    }

    #[test]
    fn test_artifact_data_url() {
        let image = Artifact::Image {
            mime_type: "image/png".to_string(),
            data: "aGVsbG8=".to_string(),
        };
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGVsbG8=");

        let video = Artifact::Video {
            url: "https://cdn.example/v.mp4".to_string(),
        };
        assert_eq!(video.to_data_url(), "https://cdn.example/v.mp4");
    }
}
