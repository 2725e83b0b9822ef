use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const INPUT_EXTENSION: &str = "json";

/// Lists every `*.json` file under `root`, depth first, with each directory's
/// entries in file-name order. A missing root yields no files. Directory
/// symlinks are not descended into; entries below the root that cannot be
/// inspected are skipped with a warning.
pub fn locate_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let root = std::path::absolute(root)?;
    if !root.is_dir() {
        tracing::info!(root = %root.display(), files_found = 0, "input root is not a directory");
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let subdirs = visit(&root, &mut out)?;
    walk(subdirs, &mut out);
    tracing::info!(root = %root.display(), files_found = out.len(), "located input files");
    Ok(out)
}

fn walk(subdirs: Vec<PathBuf>, out: &mut Vec<PathBuf>) {
    for dir in subdirs {
        match visit(&dir, out) {
            Ok(nested) => walk(nested, out),
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "skipping unreadable directory")
            }
        }
    }
}

/// Pushes the candidate files of `dir` and returns its real subdirectories.
fn visit(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "skipping unreadable entry")
            }
        }
    }
    entries.sort_by_key(|entry| entry.file_name());

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry.path();
        // file_type() does not follow symlinks.
        let ty = match entry.file_type() {
            Ok(ty) => ty,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping entry");
                continue;
            }
        };
        if ty.is_dir() {
            subdirs.push(path);
        } else if ty.is_file() {
            if is_candidate(&path) {
                out.push(path);
            }
        } else if ty.is_symlink() && is_candidate(&path) {
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => out.push(path),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping broken link")
                }
            }
        }
    }
    Ok(subdirs)
}

fn is_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    !hidden && path.extension().and_then(|ext| ext.to_str()) == Some(INPUT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "[]").unwrap();
    }

    #[test]
    fn finds_json_files_recursively_in_stable_order() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(&root.join("b.json"));
        touch(&root.join("a.json"));
        touch(&root.join("notes.txt"));
        touch(&root.join("nested").join("deeper").join("c.json"));
        touch(&root.join("nested").join("d.JSON"));
        touch(&root.join(".hidden.json"));
        touch(&root.join(".cache").join("e.json"));

        let found = locate_files(root).unwrap();
        let rel = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect::<Vec<_>>();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a.json"),
                PathBuf::from("b.json"),
                PathBuf::from(".cache/e.json"),
                PathBuf::from("nested/deeper/c.json"),
            ]
        );
        assert!(found.iter().all(|p| p.is_absolute()));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_do_not_break_the_walk() {
        use std::os::unix::fs::symlink;

        let tmp = tempdir().unwrap();
        let root = tmp.path().join("data");
        touch(&root.join("a.json"));
        touch(&tmp.path().join("outside").join("linked.json"));
        symlink(root.join("gone.txt"), root.join("notes.txt")).unwrap();
        symlink(root.join("gone.json"), root.join("dangling.json")).unwrap();
        symlink(&root, root.join("loop")).unwrap();
        symlink(
            tmp.path().join("outside").join("linked.json"),
            root.join("b.json"),
        )
        .unwrap();

        let found = locate_files(&root).unwrap();
        let rel = found
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().to_path_buf())
            .collect::<Vec<_>>();
        assert_eq!(rel, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let tmp = tempdir().unwrap();
        let found = locate_files(&tmp.path().join("absent")).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn empty_root_yields_nothing() {
        let tmp = tempdir().unwrap();
        assert!(locate_files(tmp.path()).unwrap().is_empty());
    }
}
