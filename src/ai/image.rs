use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ProviderError;

/// A validated `data:<mimetype>;base64,<payload>` image URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDataUri {
    uri: String,
    mime_end: usize,
    decoded_len: usize,
}

impl ImageDataUri {
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// e.g. `image/jpeg`
    pub fn mime_type(&self) -> &str {
        &self.uri["data:".len()..self.mime_end]
    }

    /// Size of the decoded image in bytes.
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Build a data URI from raw image bytes.
    pub fn encode(mime_type: &str, bytes: &[u8]) -> Result<Self, ProviderError> {
        format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)).parse()
    }
}

impl FromStr for ImageDataUri {
    type Err = ProviderError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let invalid =
            |reason: &str| ProviderError::InvalidInput(format!("image data URI {}", reason));

        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| invalid("must start with `data:`"))?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| invalid("must be base64 encoded"))?;
        let (kind, subtype) = mime
            .split_once('/')
            .ok_or_else(|| invalid("must include a MIME type"))?;
        if kind != "image" || subtype.is_empty() {
            return Err(invalid("must have an image MIME type"));
        }
        let decoded = STANDARD
            .decode(payload)
            .map_err(|e| invalid(&format!("has an invalid payload: {}", e)))?;
        if decoded.is_empty() {
            return Err(invalid("has an empty payload"));
        }

        Ok(Self {
            uri: uri.to_string(),
            mime_end: "data:".len() + mime.len(),
            decoded_len: decoded.len(),
        })
    }
}

impl fmt::Display for ImageDataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} image ({} bytes)", self.mime_type(), self.decoded_len)
    }
}
