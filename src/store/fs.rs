//! Filesystem [`DocumentStore`].
//!
//! Walks the corpus root with `walkdir`, keeps files matching the include
//! globs, and skips the usual tool directories. Document identity is the
//! root-relative path with `/` separators; the title is the file stem.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use super::DocumentStore;
use crate::config::Config;
use crate::frontmatter::extract_tags;
use crate::models::DocumentMeta;

#[derive(Clone)]
pub struct FsStore {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
}

impl FsStore {
    pub fn from_config(config: &Config) -> Result<Self> {
        let root = config.corpus.root.clone();
        if !root.exists() {
            bail!("Corpus root does not exist: {}", root.display());
        }

        let include = build_globset(&config.corpus.include_globs)?;

        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/.obsidian/**".to_string(),
            "**/.trash/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        if let Ok(rel) = config.state_path().strip_prefix(&root) {
            if let Some(dir) = rel.parent().filter(|d| !d.as_os_str().is_empty()) {
                excludes.push(format!("{}/**", to_id(dir)));
            }
        }
        let exclude = build_globset(&excludes)?;

        Ok(Self {
            root,
            include,
            exclude,
            follow_symlinks: config.corpus.follow_symlinks,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a document id.
    pub fn path_of(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Document id for an absolute path, if it lies under the root and
    /// matches the include/exclude globs.
    pub fn id_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let id = to_id(relative);
        if self.accepts(&id) {
            Some(id)
        } else {
            None
        }
    }

    fn accepts(&self, id: &str) -> bool {
        !self.exclude.is_match(id) && self.include.is_match(id)
    }

    fn document_meta(&self, path: &Path, id: String) -> Result<DocumentMeta> {
        let metadata = std::fs::metadata(path)?;
        let modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_default();

        let tags = std::fs::read_to_string(path)
            .map(|body| extract_tags(&body))
            .unwrap_or_default();

        let title = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(DocumentMeta {
            id,
            title,
            size: metadata.len(),
            modified,
            tags,
        })
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn list_documents(&self) -> Result<Vec<DocumentMeta>> {
        let mut docs = Vec::new();

        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let id = to_id(relative);
            if !self.accepts(&id) {
                continue;
            }

            match self.document_meta(path, id) {
                Ok(meta) => docs.push(meta),
                Err(e) => warn!("skipping {}: {:#}", path.display(), e),
            }
        }

        // Sort for deterministic ordering
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(docs)
    }

    async fn read(&self, id: &str) -> Result<String> {
        let path = self.path_of(id);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn write(&self, id: &str, text: &str) -> Result<()> {
        let path = self.path_of(id);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{}.autolink-tmp", file_name));

        tokio::fs::write(&tmp, text)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn to_id(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsStore) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("notes")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::create_dir_all(root.join(".autolink")).unwrap();
        fs::write(root.join("Alpha.md"), "Alpha body").unwrap();
        fs::write(
            root.join("notes/Beta Gamma.md"),
            "---\ntags: [draft]\n---\nBeta body",
        )
        .unwrap();
        fs::write(root.join("notes/readme.txt"), "not markdown").unwrap();
        fs::write(root.join(".obsidian/config.md"), "ignored").unwrap();
        fs::write(root.join(".autolink/state.md"), "ignored").unwrap();

        let config = Config::for_root(root);
        let store = FsStore::from_config(&config).unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn lists_markdown_documents_only() {
        let (_tmp, store) = setup();
        let docs = store.list_documents().await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["Alpha.md", "notes/Beta Gamma.md"]);
        assert_eq!(docs[1].title, "Beta Gamma");
        assert_eq!(docs[1].tags, vec!["draft"]);
        assert_eq!(docs[0].size, "Alpha body".len() as u64);
    }

    #[tokio::test]
    async fn write_replaces_content() {
        let (tmp, store) = setup();
        store.write("Alpha.md", "[[Beta Gamma]]").await.unwrap();
        assert_eq!(store.read("Alpha.md").await.unwrap(), "[[Beta Gamma]]");
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".autolink-tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn id_of_respects_globs() {
        let (tmp, store) = setup();
        assert_eq!(
            store.id_of(&tmp.path().join("notes/Beta Gamma.md")),
            Some("notes/Beta Gamma.md".to_string())
        );
        assert_eq!(store.id_of(&tmp.path().join("notes/readme.txt")), None);
        assert_eq!(store.id_of(&tmp.path().join(".obsidian/config.md")), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_symlink_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("Rust.md"), "").unwrap();
        fs::write(root.join("Notes.md"), "Rust notes.").unwrap();
        std::os::unix::fs::symlink(root.join("Gone.md"), root.join("Dangling.md")).unwrap();

        for follow in [true, false] {
            let mut config = Config::for_root(root);
            config.corpus.follow_symlinks = follow;
            let store = FsStore::from_config(&config).unwrap();
            let docs = store.list_documents().await.unwrap();
            let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
            assert_eq!(ids, vec!["Notes.md", "Rust.md"]);
        }
    }

    #[test]
    fn missing_root_is_an_error() {
        let config = Config::for_root("/definitely/not/here/autolink");
        assert!(FsStore::from_config(&config).is_err());
    }
}
