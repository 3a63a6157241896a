use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Document, ParseError, SIDECAR_EXTENSION};
use crate::util::percent_decode;

/// A parsed sidecar together with every file found next to it.
#[derive(Debug, Clone)]
pub struct Volume {
    pub document: Document,
    pub sidecar: PathBuf,
    pub files: Vec<PathBuf>,
}

impl Volume {
    pub fn load(folder: &Path) -> Result<Self, ParseError> {
        let files = collect_volume_files(folder)?;
        let sidecar = files
            .iter()
            .find(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(SIDECAR_EXTENSION))
            })
            .cloned()
            .ok_or_else(|| ParseError::NoSidecarFound(folder.display().to_string()))?;
        let bytes = std::fs::read(&sidecar).map_err(|source| ParseError::Io {
            path: sidecar.display().to_string(),
            source,
        })?;
        let document = Document::parse(&bytes)?;
        debug!(
            "loaded {} ({} pages) from {}",
            document.title,
            document.pages.len(),
            sidecar.display()
        );
        Ok(Self {
            document,
            sidecar,
            files,
        })
    }

    pub fn resolve_image_file(&self, img_path: &str) -> Option<&Path> {
        resolve_image_file(&self.files, img_path)
    }
}

/// Lists every regular file under `root`, sorted. Subtrees that cannot be
/// read for lack of permission are logged and skipped; the root itself must
/// be readable.
pub fn collect_volume_files(root: &Path) -> Result<Vec<PathBuf>, ParseError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::PermissionDenied && dir != root => {
                warn!("skipping unreadable directory {}: {}", dir.display(), err);
                continue;
            }
            Err(source) => {
                return Err(ParseError::Io {
                    path: dir.display().to_string(),
                    source,
                });
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping entry in {}: {}", dir.display(), err);
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!("skipping {}: {}", path.display(), err);
                    continue;
                }
            };
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Finds the enumerated file a sidecar image path refers to.
///
/// Sidecar paths and filesystem paths may differ in prefix and in percent
/// encoding, so both sides are decoded. A path equal to the needle wins,
/// then one ending in `/<needle>`, then the first that merely contains it.
pub fn resolve_image_file<'a>(files: &'a [PathBuf], img_path: &str) -> Option<&'a Path> {
    let needle = percent_decode(img_path);
    if needle.is_empty() {
        return None;
    }
    let suffix = format!("/{}", needle);
    let decoded: Vec<String> = files
        .iter()
        .map(|file| percent_decode(&file.to_string_lossy()))
        .collect();
    let index = decoded
        .iter()
        .position(|path| *path == needle)
        .or_else(|| decoded.iter().position(|path| path.ends_with(&suffix)))
        .or_else(|| decoded.iter().position(|path| path.contains(&needle)))?;
    Some(files[index].as_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::write_volume;
    use tempfile::tempdir;

    #[test]
    fn load_finds_nested_sidecar() {
        let dir = tempdir().expect("tempdir");
        write_volume(&dir.path().join("nested"), &["002.jpg", "001.jpg"]);
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write notes");

        let volume = Volume::load(dir.path()).expect("load volume");
        assert_eq!(volume.document.pages.len(), 2);
        assert!(volume.sidecar.ends_with("nested/volume.mokuro"));
        assert_eq!(volume.files.len(), 4);
    }

    #[test]
    fn load_without_sidecar_fails() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("001.jpg"), "x").expect("write image");
        let err = Document::load(dir.path()).unwrap_err();
        assert!(matches!(err, ParseError::NoSidecarFound(_)));
    }

    #[test]
    fn load_reports_malformed_sidecar() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.mokuro"), "{").expect("write sidecar");
        let err = Document::load(dir.path()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedDocument(_)));
    }

    #[test]
    fn resolve_matches_across_encodings() {
        let files = vec![
            PathBuf::from("/books/Neko 01/001.jpg"),
            PathBuf::from("/books/Neko 01/002.jpg"),
            PathBuf::from("/books/%E7%8C%AB/003.jpg"),
        ];
        assert_eq!(
            resolve_image_file(&files, "Neko%2001/002.jpg"),
            Some(Path::new("/books/Neko 01/002.jpg"))
        );
        assert_eq!(
            resolve_image_file(&files, "猫/003.jpg"),
            Some(Path::new("/books/%E7%8C%AB/003.jpg"))
        );
        assert_eq!(resolve_image_file(&files, "004.jpg"), None);
        assert_eq!(resolve_image_file(&files, ""), None);
    }

    #[test]
    fn resolve_prefers_whole_file_names() {
        let dir = tempdir().expect("tempdir");
        let names: Vec<String> = (1..=14).map(|n| format!("{}.jpg", n)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        write_volume(dir.path(), &refs);
        let volume = Volume::load(dir.path()).expect("load volume");

        for name in &names {
            let file = volume.resolve_image_file(name).expect("resolve page");
            assert_eq!(file.file_name().and_then(|f| f.to_str()), Some(name.as_str()));
        }
        assert_eq!(
            resolve_image_file(&[PathBuf::from("2.jpg")], "2.jpg"),
            Some(Path::new("2.jpg"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subtree_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        write_volume(dir.path(), &["001.jpg"]);
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).expect("create locked");
        std::fs::write(locked.join("hidden.jpg"), "x").expect("write hidden");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))
            .expect("lock dir");

        let result = collect_volume_files(dir.path());

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
            .expect("unlock dir");
        let files = result.expect("collect files");
        assert!(files.iter().any(|path| path.ends_with("volume.mokuro")));
        // Running as root ignores the permission bits, so the hidden file may
        // or may not appear; the walk must still succeed.
        assert!(files.len() >= 2);
    }
}
