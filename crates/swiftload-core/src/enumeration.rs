use eyre::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// One directory or regular file discovered beneath the upload root.
///
/// `local_path` is the absolute source path and is only present for files.
/// `object_path` is relative to the upload root, always `/`-separated and
/// never empty. `download_path` mirrors `object_path` under the download
/// root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPath {
    pub local_path: Option<PathBuf>,
    pub object_path: String,
    pub download_path: PathBuf,
}

impl DiscoveredPath {
    pub fn is_directory(&self) -> bool {
        self.local_path.is_none()
    }
}

/// Result of a single traversal, split by entry kind. Both lists keep the
/// traversal order.
#[derive(Debug, Default, Clone)]
pub struct DiscoveredTree {
    pub directories: Vec<DiscoveredPath>,
    pub files: Vec<DiscoveredPath>,
}

impl DiscoveredTree {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

/// Walks an upload root once and records directories and regular files.
/// Symlinks, sockets, fifos and devices are skipped silently.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    download_root: PathBuf,
}

impl TreeWalker {
    pub fn new(download_root: impl Into<PathBuf>) -> Self {
        Self {
            download_root: download_root.into(),
        }
    }

    pub fn walk(&self, root: &Path) -> Result<DiscoveredTree> {
        if !root.is_dir() {
            bail!("upload root is not a directory: {}", root.display());
        }

        let mut tree = DiscoveredTree::default();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for next in walker {
            let entry = next.with_context(|| format!("walk {}", root.display()))?;
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            let Some(rel) = relative_path(root, path) else {
                continue;
            };
            let Some(object_path) = object_path_from_relative(&rel) else {
                log::warn!("skipping non UTF-8 path {}", path.display());
                continue;
            };
            if object_path.is_empty() {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                tree.directories.push(DiscoveredPath {
                    local_path: None,
                    object_path,
                    download_path: self.download_root.join(&rel),
                });
            } else if file_type.is_file() {
                tree.files.push(DiscoveredPath {
                    local_path: Some(path.to_path_buf()),
                    object_path,
                    download_path: self.download_root.join(&rel),
                });
            }
        }

        Ok(tree)
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}

fn object_path_from_relative(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Object path for `path` beneath `root`: root prefix and leading separator
/// stripped, host separators replaced by `/`. Returns `None` for the root
/// itself or for paths outside it.
pub fn object_path_for(root: &Path, path: &Path) -> Option<String> {
    let rel = relative_path(root, path)?;
    let object_path = object_path_from_relative(&rel)?;
    if object_path.is_empty() {
        None
    } else {
        Some(object_path)
    }
}
