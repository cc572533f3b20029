//! Fallback copier: an in-process recursive tree copy used when no mirroring
//! tool can be found on the execution path.

use std::fs::{self, File, Permissions};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::error::{Result, SyncError};

/// Counts of the entries handled by one copy pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub files: usize,
    pub dirs: usize,
    pub links: usize,
}

/// Copy every entry under `source` into `dest`, depth-first.
///
/// Directories are recreated with the source directory's permission bits,
/// files are copied byte-for-byte and get the source file's permission bits.
/// `on_entry` receives one line per processed entry. Entries that exist only
/// under `dest` are never touched; a destination symlink in the place of a
/// source file or directory is replaced, not followed. The first I/O error
/// aborts the walk; what was already copied stays in place.
pub fn copy_tree<F>(source: &Path, dest: &Path, mut on_entry: F) -> Result<CopyReport>
where
    F: FnMut(&str),
{
    let mut report = CopyReport::default();
    // Directory modes are applied after their contents are written, so a
    // read-only source directory does not block copying its children.
    let mut created_dirs: Vec<(PathBuf, Permissions)> = Vec::new();

    let walker = WalkDir::new(source)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| source.display().to_string());
            SyncError::execution(format!("Error accessing path {}: {}", path, e))
        })?;

        let relative = entry.path().strip_prefix(source).map_err(|e| {
            SyncError::execution(format!(
                "Error getting relative path for {}: {}",
                entry.path().display(),
                e
            ))
        })?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            on_entry(&format!("Creating directory: {}", relative.display()));
            if let Some(permissions) =
                create_dir(entry.path(), &target).map_err(|e| copy_failed(&target, e))?
            {
                created_dirs.push((target, permissions));
            }
            report.dirs += 1;
        } else if file_type.is_symlink() {
            on_entry(&format!("Linking: {}", relative.display()));
            copy_symlink(entry.path(), &target).map_err(|e| copy_failed(&target, e))?;
            report.links += 1;
        } else {
            on_entry(&format!("Copying file: {}", relative.display()));
            copy_file(entry.path(), &target).map_err(|e| copy_failed(&target, e))?;
            report.files += 1;
        }
    }

    for (dir, permissions) in created_dirs.into_iter().rev() {
        fs::set_permissions(&dir, permissions).map_err(|e| copy_failed(&dir, e))?;
    }

    Ok(report)
}

fn copy_failed(target: &Path, err: io::Error) -> SyncError {
    SyncError::execution(format!("Failed to copy to {}: {}", target.display(), err))
}

/// Returns the permissions to apply later when the directory was newly
/// created; an existing destination directory is left as it is.
fn create_dir(src: &Path, target: &Path) -> io::Result<Option<Permissions>> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => return Ok(None),
        Ok(meta) if meta.file_type().is_symlink() => remove_link(target)?,
        _ => {}
    }

    fs::create_dir(target)?;
    Ok(Some(fs::metadata(src)?.permissions()))
}

/// Copy file content exactly and re-apply the source permission bits.
fn copy_file(src: &Path, target: &Path) -> io::Result<u64> {
    let permissions = fs::metadata(src)?.permissions();

    // 目标端同名的符号链接只替换链接本身，不写入它指向的文件
    if let Ok(meta) = fs::symlink_metadata(target) {
        if meta.file_type().is_symlink() {
            remove_link(target)?;
        }
    }

    let mut reader = File::open(src)?;
    let mut writer = File::create(target)?;
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;

    fs::set_permissions(target, permissions)?;
    Ok(copied)
}

// Windows 上指向目录的链接需要用 remove_dir 删除
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_file(link).or_else(|e| {
        if cfg!(windows) {
            fs::remove_dir(link)
        } else {
            Err(e)
        }
    })
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> io::Result<()> {
    let link = fs::read_link(src)?;

    match fs::symlink_metadata(target) {
        // 目标已存在同名条目时保持原样
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => std::os::unix::fs::symlink(link, target),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> io::Result<()> {
    copy_file(src, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn build_source(root: &Path) {
        fs::create_dir_all(root.join("subdir/nested")).unwrap();
        fs::write(root.join("file1.txt"), "A").unwrap();
        fs::write(root.join("file2.txt"), "B").unwrap();
        fs::write(root.join("subdir/file3.txt"), "C").unwrap();
        fs::write(root.join("subdir/nested/data.bin"), vec![0u8, 1, 2, 255]).unwrap();
    }

    #[test]
    fn test_copy_tree_replicates_structure() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        build_source(src.path());

        let mut lines = Vec::new();
        let report = copy_tree(src.path(), dst.path(), |line| lines.push(line.to_string())).unwrap();

        assert_eq!(report.files, 4);
        assert_eq!(report.dirs, 2);
        assert_eq!(fs::read_to_string(dst.path().join("file1.txt")).unwrap(), "A");
        assert_eq!(fs::read_to_string(dst.path().join("file2.txt")).unwrap(), "B");
        assert_eq!(fs::read_to_string(dst.path().join("subdir/file3.txt")).unwrap(), "C");
        assert_eq!(
            fs::read(dst.path().join("subdir/nested/data.bin")).unwrap(),
            vec![0u8, 1, 2, 255]
        );

        // one line per entry, parents before children
        assert_eq!(lines.len(), 6);
        let subdir = lines.iter().position(|l| l == "Creating directory: subdir").unwrap();
        let file3 = lines
            .iter()
            .position(|l| l.starts_with("Copying file: subdir") && l.ends_with("file3.txt"))
            .unwrap();
        assert!(subdir < file3);
    }

    #[test]
    fn test_copy_tree_keeps_destination_only_files() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        build_source(src.path());

        fs::create_dir_all(dst.path().join("subdir")).unwrap();
        fs::write(dst.path().join("only-here.txt"), "keep me").unwrap();
        fs::write(dst.path().join("subdir/also-here.txt"), "and me").unwrap();

        copy_tree(src.path(), dst.path(), |_| {}).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("only-here.txt")).unwrap(), "keep me");
        assert_eq!(
            fs::read_to_string(dst.path().join("subdir/also-here.txt")).unwrap(),
            "and me"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_replaces_destination_symlinks() {
        use std::os::unix::fs::symlink;

        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "SOURCE").unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub/inner.txt"), "INNER").unwrap();

        fs::write(dst.path().join("only_dest.txt"), "KEEP").unwrap();
        fs::create_dir(dst.path().join("only_dest_dir")).unwrap();
        symlink(dst.path().join("only_dest.txt"), dst.path().join("a.txt")).unwrap();
        symlink(dst.path().join("only_dest_dir"), dst.path().join("sub")).unwrap();

        let report = copy_tree(src.path(), dst.path(), |_| {}).unwrap();
        assert_eq!(report.files, 2);

        // entries without a source counterpart are untouched
        assert_eq!(fs::read_to_string(dst.path().join("only_dest.txt")).unwrap(), "KEEP");
        assert!(!dst.path().join("only_dest_dir/inner.txt").exists());

        // the links were replaced by real entries
        let a = dst.path().join("a.txt");
        assert!(!fs::symlink_metadata(&a).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&a).unwrap(), "SOURCE");
        assert!(fs::symlink_metadata(dst.path().join("sub")).unwrap().is_dir());
        assert_eq!(fs::read_to_string(dst.path().join("sub/inner.txt")).unwrap(), "INNER");
    }

    #[test]
    fn test_copy_tree_overwrites_changed_content() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("file.txt"), "new content").unwrap();
        fs::write(dst.path().join("file.txt"), "old content that is longer").unwrap();

        copy_tree(src.path(), dst.path(), |_| {}).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("file.txt")).unwrap(), "new content");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_replicates_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir(src.path().join("private")).unwrap();
        fs::write(src.path().join("run.sh"), "#!/bin/sh\n").unwrap();
        fs::write(src.path().join("private/secret"), "s").unwrap();
        fs::set_permissions(src.path().join("run.sh"), Permissions::from_mode(0o750)).unwrap();
        fs::set_permissions(src.path().join("private/secret"), Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(src.path().join("private"), Permissions::from_mode(0o700)).unwrap();

        copy_tree(src.path(), dst.path(), |_| {}).unwrap();

        let mode = |p: PathBuf| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(dst.path().join("run.sh")), 0o750);
        assert_eq!(mode(dst.path().join("private/secret")), 0o600);
        assert_eq!(mode(dst.path().join("private")), 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_recreates_symlinks() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("target.txt"), "T").unwrap();
        std::os::unix::fs::symlink("target.txt", src.path().join("link.txt")).unwrap();

        let report = copy_tree(src.path(), dst.path(), |_| {}).unwrap();

        assert_eq!(report.links, 1);
        assert_eq!(
            fs::read_link(dst.path().join("link.txt")).unwrap(),
            PathBuf::from("target.txt")
        );
    }

    #[test]
    fn test_copy_tree_aborts_on_first_error() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "A").unwrap();
        fs::create_dir(src.path().join("b")).unwrap();
        fs::write(src.path().join("b/inner.txt"), "I").unwrap();
        fs::write(src.path().join("c.txt"), "C").unwrap();
        // a regular file where the source has a directory
        fs::write(dst.path().join("b"), "blocker").unwrap();

        let err = copy_tree(src.path(), dst.path(), |_| {}).unwrap_err();

        assert!(matches!(err, SyncError::ExecutionFailed { .. }));
        // entries before the failure stay copied, entries after it are not reached
        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "A");
        assert!(!dst.path().join("c.txt").exists());
        assert_eq!(fs::read_to_string(dst.path().join("b")).unwrap(), "blocker");
    }
}
