//! Root-confined resolution of user-supplied relative paths.

use std::path::{Component, Path, PathBuf};

use crate::error::GuardError;

/// Resolve `fragment` against `root`, refusing anything that leaves it.
///
/// Absolute fragments are rejected outright. `..` is folded lexically and
/// may not climb above the root. When the target exists it is
/// canonicalized (following symlinks) and must still lie strictly inside
/// the canonical root; the root itself is never a valid target. The target
/// does not have to exist, but its deepest existing ancestor is
/// canonicalized and checked the same way.
pub fn resolve(root: &Path, fragment: &str) -> Result<PathBuf, GuardError> {
    if fragment.trim().is_empty() {
        return Err(GuardError::Empty);
    }

    let candidate = Path::new(fragment);
    if candidate.is_absolute() || fragment.starts_with('/') || fragment.starts_with('\\') {
        return Err(GuardError::Absolute(fragment.to_string()));
    }

    let mut relative = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(GuardError::OutsideRoot(fragment.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(GuardError::Absolute(fragment.to_string()));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(GuardError::OutsideRoot(fragment.to_string()));
    }

    let root = absolute_root(root);
    let joined = root.join(&relative);
    if std::fs::symlink_metadata(&joined).is_err() {
        return resolve_missing(&root, &relative, fragment);
    }

    let resolved = joined
        .canonicalize()
        .map_err(|_| GuardError::OutsideRoot(fragment.to_string()))?;
    if resolved == root || !resolved.starts_with(&root) {
        return Err(GuardError::OutsideRoot(fragment.to_string()));
    }
    Ok(resolved)
}

/// Anchor a missing target at its deepest existing ancestor, which must
/// canonicalize to the root or somewhere below it.
fn resolve_missing(root: &Path, relative: &Path, fragment: &str) -> Result<PathBuf, GuardError> {
    if std::fs::symlink_metadata(root).is_err() {
        return Ok(root.join(relative));
    }
    let mut existing = relative.to_path_buf();
    let mut tail = Vec::new();
    while !existing.as_os_str().is_empty()
        && std::fs::symlink_metadata(root.join(&existing)).is_err()
    {
        if let Some(name) = existing.file_name() {
            tail.push(name.to_os_string());
        }
        existing.pop();
    }

    let anchor = root
        .join(&existing)
        .canonicalize()
        .map_err(|_| GuardError::OutsideRoot(fragment.to_string()))?;
    if !anchor.starts_with(root) {
        return Err(GuardError::OutsideRoot(fragment.to_string()));
    }
    Ok(tail.iter().rev().fold(anchor, |path, name| path.join(name)))
}

/// Render `path` relative to `root` with `/` separators, if it lies inside.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let root = absolute_root(root);
    let rel = path.strip_prefix(&root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Canonical form of `root` when it exists, otherwise an absolute lexical form.
pub fn absolute_root(root: &Path) -> PathBuf {
    if let Ok(canonical) = root.canonicalize() {
        return canonical;
    }
    if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(root))
            .unwrap_or_else(|_| root.to_path_buf())
    }
}
