use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::utils::validation::{is_extension_allowed, random_token, sanitize_filename};
use std::path::{Path, PathBuf};

/// A client filename kept apart from the name we store under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    /// As sent by the client. Display and logs only, never a path.
    pub original: String,
    /// Safe storage key; contains no path separators.
    pub sanitized: String,
}

/// Turns untrusted filenames into storage names and free paths inside the
/// destination directory.
#[derive(Debug, Clone)]
pub struct NameResolver {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
    allow_overwrite: bool,
}

impl NameResolver {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            allowed_extensions: config.allowed_extensions.clone(),
            allow_overwrite: config.allow_overwrite,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn allow_overwrite(&self) -> bool {
        self.allow_overwrite
    }

    pub fn sanitize(&self, original: &str) -> UploadName {
        let mut sanitized = sanitize_filename(original);
        if sanitized.is_empty() {
            sanitized = random_token();
            tracing::debug!(
                "Filename {:?} has no usable characters, using {}",
                original,
                sanitized
            );
        }
        UploadName {
            original: original.to_string(),
            sanitized,
        }
    }

    /// Sanitizes and applies the extension allow-list.
    pub fn prepare(&self, original: &str) -> Result<UploadName, AppError> {
        let name = self.sanitize(original);
        if !is_extension_allowed(&name.sanitized, &self.allowed_extensions) {
            tracing::warn!("Rejected upload {:?}: extension not allowed", original);
            return Err(AppError::PolicyRejected {
                filename: name.original,
            });
        }
        Ok(name)
    }

    /// Picks the final path for `name` against the directory as it is now.
    ///
    /// With overwrite enabled this is always the direct path. Otherwise the
    /// first free name of `name`, `name (1)`, `name (2)`, ... is returned. The
    /// check is not locked against other requests; the publisher's no-clobber
    /// rename catches a lost race.
    pub async fn resolve(&self, name: &UploadName) -> Result<PathBuf, AppError> {
        let direct = self.dir.join(&name.sanitized);
        if self.allow_overwrite {
            return Ok(direct);
        }

        if !occupied(&direct)
            .await
            .map_err(|e| AppError::io(&name.original, e))?
        {
            return Ok(direct);
        }

        let mut n: u64 = 1;
        loop {
            let candidate = self.dir.join(numbered_name(&name.sanitized, n));
            if !occupied(&candidate)
                .await
                .map_err(|e| AppError::io(&name.original, e))?
            {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

/// Any directory entry counts, including dangling symlinks.
async fn occupied(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Inserts " (n)" before the extension: the text from the last dot, unless
/// only dots precede it.
pub fn numbered_name(name: &str, n: u64) -> String {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => {
            format!("{} ({}){}", &name[..idx], n, &name[idx..])
        }
        _ => format!("{} ({})", name, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(dir: &Path, overwrite: bool, allowed: &[&str]) -> NameResolver {
        let mut config = UploadConfig::development(dir);
        config.allow_overwrite = overwrite;
        config.allowed_extensions = allowed.iter().map(|s| s.to_string()).collect();
        NameResolver::new(&config)
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("notes.txt", 1), "notes (1).txt");
        assert_eq!(numbered_name("archive.tar.gz", 2), "archive.tar (2).gz");
        assert_eq!(numbered_name("README", 3), "README (3)");
        assert_eq!(numbered_name(".env", 1), ".env (1)");
        assert_eq!(numbered_name("..tar", 1), "..tar (1)");
        assert_eq!(numbered_name("a.", 1), "a (1).");
    }

    #[test]
    fn test_sanitize_keeps_original_separate() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), false, &[]);
        let name = r.sanitize("../../etc/pass wd.txt");
        assert_eq!(name.original, "../../etc/pass wd.txt");
        assert_eq!(name.sanitized, "....etcpass wd.txt");
    }

    #[test]
    fn test_empty_name_gets_random_token() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), false, &[]);
        let name = r.sanitize("///\\\\");
        assert_eq!(name.sanitized.len(), 16);
        assert!(name.sanitized.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_policy_rejection_names_original() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), false, &[".txt"]);
        assert!(r.prepare("notes.txt").is_ok());
        assert!(r.prepare("NOTES.TXT").is_ok());
        match r.prepare("dir/notes.exe") {
            Err(AppError::PolicyRejected { filename }) => assert_eq!(filename, "dir/notes.exe"),
            other => panic!("expected policy rejection, got {:?}", other),
        }
        // A random token has no extension, so it cannot pass a non-empty list
        assert!(matches!(
            r.prepare("???"),
            Err(AppError::PolicyRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_direct_when_free() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), false, &[]);
        let name = r.sanitize("notes.txt");
        assert_eq!(r.resolve(&name).await.unwrap(), dir.path().join("notes.txt"));
    }

    #[tokio::test]
    async fn test_resolve_counts_up_past_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("notes (1).txt"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("notes (2).txt")).unwrap();

        let r = resolver(dir.path(), false, &[]);
        let name = r.sanitize("notes.txt");
        assert_eq!(
            r.resolve(&name).await.unwrap(),
            dir.path().join("notes (3).txt")
        );
    }

    #[tokio::test]
    async fn test_resolve_overwrite_returns_direct_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"a").unwrap();
        let r = resolver(dir.path(), true, &[]);
        let name = r.sanitize("notes.txt");
        assert_eq!(r.resolve(&name).await.unwrap(), dir.path().join("notes.txt"));
    }

    #[tokio::test]
    async fn test_hostile_names_stay_inside_directory() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), false, &[]);
        let hostile = [
            "../../../etc/passwd",
            "..",
            ".",
            "/",
            "\\..\\..\\boot.ini",
            "a/../../b",
            "nul\0byte",
            "ctrl\r\n\t\u{1b}[31m",
            "C:\\Windows\\win.ini",
            "",
        ];
        for raw in hostile {
            let name = r.sanitize(raw);
            let path = r.resolve(&name).await.unwrap();
            assert_eq!(path.parent(), Some(dir.path()), "escaped for {:?}", raw);
            assert_eq!(
                path.file_name().and_then(|n| n.to_str()),
                Some(name.sanitized.as_str())
            );
        }
    }
}
