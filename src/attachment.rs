use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// An image (or other file) riding along with exactly one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Base64 (standard alphabet) payload.
    pub data: String,
}

impl Attachment {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Read and encode a file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read attachment at {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self::from_bytes(name, mime_for(path), &bytes))
    }

    /// Size of the decoded payload, for display.
    pub fn decoded_len(&self) -> usize {
        self.data.len() / 4 * 3 - self.data.bytes().rev().take_while(|&b| b == b'=').count()
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_encodes_and_detects_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Shot.PNG");
        fs::write(&path, b"\x89PNG-ish").unwrap();

        let att = Attachment::from_path(&path).unwrap();
        assert_eq!(att.name, "Shot.PNG");
        assert_eq!(att.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&att.data).unwrap(), b"\x89PNG-ish");
        assert_eq!(att.decoded_len(), 8);
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        assert_eq!(mime_for(Path::new("notes.txt")), "application/octet-stream");
        assert_eq!(mime_for(Path::new("photo.JPEG")), "image/jpeg");
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Attachment::from_path(&dir.path().join("nope.png")).unwrap_err();
        assert!(err.to_string().contains("Failed to read attachment"));
    }

    #[test]
    fn test_wire_shape_uses_mime_type_key() {
        let att = Attachment::from_bytes("a.gif", "image/gif", b"GIF89a");
        let v = serde_json::to_value(&att).unwrap();
        assert_eq!(v["mimeType"], "image/gif");
        assert_eq!(v["name"], "a.gif");
        assert!(v.get("mime_type").is_none());
    }
}
