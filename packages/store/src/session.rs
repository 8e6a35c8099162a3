//! Signed-in session persistence between CLI invocations.

use std::path::{Path, PathBuf};

use crate::{AuthUser, StoreError};

const DEFAULT_SESSION_FILE: &str = ".mangrove_session.json";

/// Session file location: `MANGROVE_SESSION` or `.mangrove_session.json`
/// in the working directory.
#[must_use]
pub fn session_path() -> PathBuf {
    std::env::var("MANGROVE_SESSION")
        .map_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from)
}

/// Reads a saved session. A missing file means no session.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<Option<AuthUser>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes the session, replacing any previous one.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be written.
pub fn save(path: &Path, user: &AuthUser) -> Result<(), StoreError> {
    std::fs::write(path, serde_json::to_string_pretty(user)?)?;
    Ok(())
}

/// Deletes the session file if present.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be removed.
pub fn clear(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_clear() {
        let path = std::env::temp_dir().join("mangrove_session_test.json");
        let _ = std::fs::remove_file(&path);
        assert!(load(&path).unwrap().is_none());

        let user = AuthUser {
            uid: "abc".to_string(),
            email: "ranger@example.com".to_string(),
            id_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
        };
        save(&path, &user).unwrap();
        assert_eq!(load(&path).unwrap(), Some(user));

        clear(&path).unwrap();
        assert!(load(&path).unwrap().is_none());
        clear(&path).unwrap();
    }
}
