//! 데이터셋 로딩 - 위치 JSON, 여행 텍스트
//!
//! 위치 파일 형식:
//! ```json
//! [
//!   {"name": "Paris", "type": "city", "country": "France",
//!    "description": "...", "connected_to": [{"name": "Lyon", "type": "TRAIN_TO"}]}
//! ]
//! ```

use std::path::Path;

use crate::error::{RagError, Result};

use super::graph::Location;

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| RagError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// 위치 JSON 파일 파싱
pub fn parse_location_file(path: &Path) -> Result<Vec<Location>> {
    let bytes = read_bytes(path)?;

    let locations: Vec<Location> =
        serde_json::from_slice(&bytes).map_err(|e| RagError::DataFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if let Some(index) = locations.iter().position(|l| l.name.trim().is_empty()) {
        return Err(RagError::DataFormat {
            path: path.to_path_buf(),
            message: format!("location #{} has an empty name", index),
        });
    }

    tracing::debug!("Parsed {} locations from {}", locations.len(), path.display());
    Ok(locations)
}

/// 여행 텍스트 파일 읽기 (UTF-8)
pub fn read_text_file(path: &Path) -> Result<String> {
    let bytes = read_bytes(path)?;

    String::from_utf8(bytes).map_err(|e| RagError::DataFormat {
        path: path.to_path_buf(),
        message: format!("not valid UTF-8: {}", e.utf8_error()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_locations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locations.json");
        fs::write(
            &path,
            r#"[
                {"name": "Paris", "type": "city", "country": "France",
                 "description": "Capital", "connected_to": [{"name": "Lyon", "type": "TRAIN_TO"}]},
                {"name": "Lyon"}
            ]"#,
        )
        .unwrap();

        let locations = parse_location_file(&path).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].connected_to.len(), 1);
        assert_eq!(locations[0].connected_to[0].kind.as_deref(), Some("TRAIN_TO"));
        assert_eq!(locations[1].country, "");
        assert!(locations[1].connected_to.is_empty());
    }

    #[test]
    fn test_malformed_json_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{\"name\": \"Paris\"").unwrap();

        let err = parse_location_file(&path).unwrap_err();
        assert!(matches!(err, RagError::DataFormat { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locations.json");
        fs::write(&path, r#"[{"name": "Paris"}, {"name": "  "}]"#).unwrap();

        let err = parse_location_file(&path).unwrap_err();
        assert!(err.to_string().contains("#1"));
    }

    #[test]
    fn test_missing_file_is_io() {
        let dir = TempDir::new().unwrap();
        let err = parse_location_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RagError::Io { .. }));
    }

    #[test]
    fn test_read_text() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("travel.txt");
        fs::write(&good, "Paris is lovely in spring.").unwrap();
        assert_eq!(read_text_file(&good).unwrap(), "Paris is lovely in spring.");

        let bad = dir.path().join("binary.txt");
        fs::write(&bad, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(read_text_file(&bad), Err(RagError::DataFormat { .. })));
    }
}
