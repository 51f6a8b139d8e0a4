use std::path::Path;

use tokio::fs;

use crate::error::TemplateError;

/// Writes `content` to `path` unless the file already holds exactly that.
///
/// The new content goes to a temporary sibling first and is renamed into
/// place, so readers never observe a partial file. Returns whether the file
/// changed.
pub async fn write_if_changed(path: &Path, content: &str) -> Result<bool, TemplateError> {
    if let Ok(current) = fs::read(path).await {
        if current == content.as_bytes() {
            return Ok(false);
        }
    }

    let write_error = |e: std::io::Error| TemplateError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(write_error)?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TemplateError::Write {
            path: path.to_path_buf(),
            message: "path has no file name".to_string(),
        })?;
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    fs::write(&temp_path, content).await.map_err(write_error)?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(write_error(e));
    }

    Ok(true)
}

/// Returns true if the file at `path` holds something other than `content`
/// (including when it is missing or unreadable).
pub async fn diverges(path: &Path, content: &str) -> bool {
    match fs::read(path).await {
        Ok(current) => current != content.as_bytes(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parents_and_skips_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/app.conf");

        assert!(write_if_changed(&path, "a=1\n").await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a=1\n");
        assert!(!write_if_changed(&path, "a=1\n").await.unwrap());
        assert!(write_if_changed(&path, "a=2\n").await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a=2\n");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        write_if_changed(&path, "x").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_diverges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        assert!(diverges(&path, "x").await);
        std::fs::write(&path, "x").unwrap();
        assert!(!diverges(&path, "x").await);
        assert!(diverges(&path, "y").await);
    }

    #[tokio::test]
    async fn test_write_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let result = write_if_changed(&blocker.join("app.conf"), "x").await;
        assert!(matches!(result, Err(TemplateError::Write { .. })));
    }
}
