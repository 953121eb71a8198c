//! Curated playlist manifests — static JSON documents describing image
//! collections that browse alongside the live submission gallery.
//!
//! Two accepted shapes:
//!   `{"images": [{"src": "...", "alt": "..."}, ...]}`
//!   `[{"src": "...", "alt": "..."}, ...]`

use std::path::Path;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PlaylistItem {
    pub src: String,
    #[serde(default)]
    pub alt: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Manifest {
    Wrapped { images: Vec<PlaylistItem> },
    Bare(Vec<PlaylistItem>),
}

/// Parse a manifest document in either accepted shape.
pub fn parse_manifest(json: &str) -> Result<Vec<PlaylistItem>, String> {
    match serde_json::from_str::<Manifest>(json).map_err(|e| format!("bad playlist manifest: {}", e))? {
        Manifest::Wrapped { images } => Ok(images),
        Manifest::Bare(items) => Ok(items),
    }
}

/// Load and parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<PlaylistItem>, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("read {}: {}", path.display(), e))?;
    parse_manifest(&json)
}

/// Display name of a playlist, derived from its file stem.
pub fn manifest_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "playlist".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_wrapped_shape() {
        let items = parse_manifest(
            r#"{"images": [{"src": "a.png", "alt": "first"}, {"src": "b.png", "alt": "second"}]}"#,
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].src, "a.png");
        assert_eq!(items[1].alt, "second");
    }

    #[test]
    fn parses_the_bare_array_shape() {
        let items = parse_manifest(r#"[{"src": "c.png", "alt": "only"}]"#).unwrap();
        assert_eq!(items, vec![PlaylistItem {
            src: "c.png".into(),
            alt: "only".into(),
        }]);
    }

    #[test]
    fn alt_text_is_optional() {
        let items = parse_manifest(r#"[{"src": "d.png"}]"#).unwrap();
        assert_eq!(items[0].alt, "");
    }

    #[test]
    fn rejects_documents_in_neither_shape() {
        assert!(parse_manifest(r#"{"pictures": []}"#).is_err());
        assert!(parse_manifest("not json").is_err());
    }
}
