//! Workspace path containment
//!
//! Every filesystem tool resolves its caller-supplied path here first.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Error: access outside the workspace directory is not allowed")]
pub struct SandboxViolation;

/// A workspace root that file tools may not leave
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create the root directory if needed and pin its canonical form
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` against the root.
    ///
    /// Symlinks are followed as each existing component is visited, so the
    /// containment check runs on the real target. A dangling symlink cannot be
    /// checked and is treated as a violation.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxViolation> {
        let mut resolved = self.root.clone();

        for component in Path::new(relative).components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    resolved = PathBuf::from(component.as_os_str());
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(part) => {
                    resolved.push(part);
                    match fs::symlink_metadata(&resolved) {
                        Ok(meta) if meta.file_type().is_symlink() => {
                            resolved = resolved.canonicalize().map_err(|_| SandboxViolation)?;
                        }
                        Ok(_) => {
                            if let Ok(canonical) = resolved.canonicalize() {
                                resolved = canonical;
                            }
                        }
                        Err(_) => {}
                    }
                }
            }
        }

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            tracing::warn!(path = %relative, "Rejected path outside workspace");
            Err(SandboxViolation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_stay_inside() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let root = sandbox.root().to_path_buf();

        assert_eq!(sandbox.resolve("notes/a.md").unwrap(), root.join("notes/a.md"));
        assert_eq!(sandbox.resolve(".").unwrap(), root);
        assert_eq!(sandbox.resolve("a/../b.txt").unwrap(), root.join("b.txt"));
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("ws")).unwrap();
        assert_eq!(sandbox.resolve("../../etc/passwd"), Err(SandboxViolation));
        assert_eq!(sandbox.resolve(".."), Err(SandboxViolation));
    }

    #[test]
    fn test_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        assert_eq!(sandbox.resolve("/etc/passwd"), Err(SandboxViolation));

        let inside = sandbox.root().join("x.txt");
        assert_eq!(sandbox.resolve(inside.to_str().unwrap()).unwrap(), inside);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let sandbox = Sandbox::new(dir.path().join("ws")).unwrap();
        std::os::unix::fs::symlink(&outside, sandbox.root().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), sandbox.root().join("dangling"))
            .unwrap();

        assert_eq!(sandbox.resolve("link/secret.txt"), Err(SandboxViolation));
        assert_eq!(sandbox.resolve("link"), Err(SandboxViolation));
        assert_eq!(sandbox.resolve("dangling"), Err(SandboxViolation));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_within_root_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        fs::create_dir_all(sandbox.root().join("real")).unwrap();
        std::os::unix::fs::symlink(sandbox.root().join("real"), sandbox.root().join("alias"))
            .unwrap();
        assert_eq!(
            sandbox.resolve("alias/f.txt").unwrap(),
            sandbox.root().join("real/f.txt")
        );
    }
}
