use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::FONT_EXTENSIONS;

/// Whether `path` names a font file this tool can sample.
pub fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FONT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Lazy depth-first walk yielding font paths as they are discovered.
///
/// Entries of each directory are visited in name order so two scans of the
/// same tree produce the same sequence. Directory symlinks are not followed.
#[derive(Debug)]
pub struct FontScanner {
    walk: walkdir::IntoIter,
    dirs_visited: usize,
    fonts_found: usize,
}

impl FontScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> FontScanner {
        FontScanner {
            walk: WalkDir::new(root).sort_by_file_name().into_iter(),
            dirs_visited: 0,
            fonts_found: 0,
        }
    }

    pub fn dirs_visited(&self) -> usize {
        self.dirs_visited
    }

    pub fn fonts_found(&self) -> usize {
        self.fonts_found
    }
}

impl Iterator for FontScanner {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.walk.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "cannot read directory entry, skipping");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                self.dirs_visited += 1;
                continue;
            }
            if is_font_file(entry.path()) {
                self.fonts_found += 1;
                return Some(entry.into_path());
            }
            if entry.path_is_symlink() && entry.path().is_dir() {
                debug!(path = %entry.path().display(), "not following directory symlink");
            }
        }
    }
}

/// Number of directories under `root` (inclusive); sizes the scan progress bar.
pub fn count_directories<P: AsRef<Path>>(root: P) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .count()
}

/// Collect every font under `root`.
pub fn find_fonts<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    FontScanner::new(root).collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn matches_extensions_case_insensitively() {
        assert!(is_font_file(Path::new("a/B.TTF")));
        assert!(is_font_file(Path::new("c.otf")));
        assert!(is_font_file(Path::new("c.OtF")));
        assert!(!is_font_file(Path::new("c.woff2")));
        assert!(!is_font_file(Path::new("ttf")));
    }

    #[test_log::test]
    fn scans_nested_tree_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.ttf"));
        touch(&root.join("a.OTF"));
        touch(&root.join("notes.txt"));
        touch(&root.join("sub/z.ttf"));
        touch(&root.join("sub/deeper/y.otf"));
        touch(&root.join("empty/readme"));

        let mut scanner = FontScanner::new(root);
        let found: Vec<_> = scanner
            .by_ref()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a.OTF"),
                PathBuf::from("b.ttf"),
                PathBuf::from("sub/deeper/y.otf"),
                PathBuf::from("sub/z.ttf"),
            ]
        );
        assert_eq!(scanner.fonts_found(), 4);
        assert_eq!(scanner.dirs_visited(), 4);
        assert_eq!(count_directories(root), 4);
    }

    #[cfg(unix)]
    #[test_log::test]
    fn does_not_follow_directory_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("real/x.ttf"));
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).unwrap();

        let found: Vec<_> = find_fonts(root)
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(found, vec![PathBuf::from("real/x.ttf")]);
        assert_eq!(count_directories(root), 2);
    }

    #[cfg(unix)]
    #[test_log::test]
    fn unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("a.ttf"));
        touch(&root.join("locked/b.ttf"));
        touch(&root.join("z.ttf"));
        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Privileged users can read the directory anyway.
        let readable = fs::read_dir(&locked).is_ok();

        let found = find_fonts(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let expected = if readable { 3 } else { 2 };
        assert_eq!(found.len(), expected);
        assert!(found.iter().any(|p| p.ends_with("z.ttf")));
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_fonts(dir.path()).is_empty());
    }
}
