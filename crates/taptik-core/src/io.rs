use crate::error::{Result, TaptikError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// FileSystem
// ---------------------------------------------------------------------------

/// File access used by every builder and converter strategy.
///
/// Strategies never touch `std::fs` directly so deployment and extraction can
/// run against an injected implementation.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;

    fn is_directory(&self, path: &Path) -> bool;

    fn read_file(&self, path: &Path) -> Result<String>;

    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Entry names (not full paths) in `path`, sorted.
    fn read_directory(&self, path: &Path) -> Result<Vec<String>>;

    fn ensure_directory(&self, path: &Path) -> Result<()>;

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let data = self.read_file(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let mut data = serde_json::to_string_pretty(value)?;
        data.push('\n');
        self.write_file(path, &data)
    }
}

// ---------------------------------------------------------------------------
// LocalFs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        atomic_write(path, content.as_bytes())
    }

    fn read_directory(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn ensure_directory(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }
}

/// Atomically write `data` to `path` using a tempfile in the same directory.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Expand a leading `~` or `~/` to the user's home directory.
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let Some(s) = path.to_str() else {
        return Ok(path.to_path_buf());
    };
    if s == "~" {
        return home::home_dir().ok_or(TaptikError::HomeNotFound);
    }
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = home::home_dir().ok_or(TaptikError::HomeNotFound)?;
            Ok(home.join(rest))
        }
        None => Ok(path.to_path_buf()),
    }
}

/// Split optional YAML frontmatter from a markdown document.
///
/// Malformed frontmatter is treated as ordinary body text.
pub fn split_frontmatter<T: DeserializeOwned>(content: &str) -> (Option<T>, String) {
    let Some(rest) = content.strip_prefix("---") else {
        return (None, content.to_string());
    };
    let Some(end) = rest.find("\n---") else {
        return (None, content.to_string());
    };
    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
    match serde_yaml::from_str::<T>(yaml) {
        Ok(meta) => (Some(meta), body.to_string()),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed frontmatter");
            (None, content.to_string())
        }
    }
}

/// Drop a `---` delimited frontmatter block without parsing it.
///
/// An unterminated block is not frontmatter and the content is returned as is.
pub fn strip_frontmatter(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---") else {
        return content;
    };
    match rest.find("\n---") {
        Some(end) => rest[end + 4..].trim_start_matches(['\r', '\n']),
        None => content,
    }
}

/// Prefix `body` with a YAML frontmatter block.
pub fn render_frontmatter<T: Serialize>(meta: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(meta)?;
    Ok(format!("---\n{yaml}---\n\n{}\n", body.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/test.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn read_directory_is_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b.md", "a.md", "c.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let names = LocalFs.read_directory(dir.path()).unwrap();
        assert_eq!(names, vec!["a.md", "b.md", "c.md"]);
    }

    #[test]
    fn json_roundtrip_through_fs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings/mcp.json");
        LocalFs
            .write_json(&path, &serde_json::json!({"mcpServers": {}}))
            .unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
        let back: serde_json::Value = LocalFs.read_json(&path).unwrap();
        assert!(back["mcpServers"].is_object());
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        let p = Path::new("/etc/kiro");
        assert_eq!(expand_tilde(p).unwrap(), PathBuf::from("/etc/kiro"));
        let rel = Path::new("relative/~/dir");
        assert_eq!(expand_tilde(rel).unwrap(), PathBuf::from("relative/~/dir"));
    }

    #[derive(Deserialize)]
    struct Meta {
        description: String,
    }

    #[test]
    fn frontmatter_split() {
        let (meta, body) =
            split_frontmatter::<Meta>("---\ndescription: Lint\n---\nnpm run lint\n");
        assert_eq!(meta.unwrap().description, "Lint");
        assert_eq!(body, "npm run lint\n");
    }

    #[test]
    fn frontmatter_render_then_split() {
        #[derive(Serialize)]
        struct Out<'a> {
            description: &'a str,
        }
        let text = render_frontmatter(&Out { description: "Lint" }, "npm run lint").unwrap();
        assert_eq!(text, "---\ndescription: Lint\n---\n\nnpm run lint\n");
        let (meta, body) = split_frontmatter::<Meta>(&text);
        assert_eq!(meta.unwrap().description, "Lint");
        assert_eq!(body, "npm run lint\n");
    }

    #[test]
    fn strip_frontmatter_ignores_yaml_validity() {
        let input = "---\ndescription: TS rules\nglobs: *.ts,*.tsx\nalwaysApply: false\n---\nPrefer interfaces.";
        assert_eq!(strip_frontmatter(input), "Prefer interfaces.");
        assert_eq!(strip_frontmatter("no block"), "no block");
        assert_eq!(strip_frontmatter("---\nunterminated"), "---\nunterminated");
    }

    #[test]
    fn frontmatter_malformed_keeps_body() {
        let input = "---\n: [unclosed\n---\nbody";
        let (meta, body) = split_frontmatter::<Meta>(input);
        assert!(meta.is_none());
        assert_eq!(body, input);
    }
}
