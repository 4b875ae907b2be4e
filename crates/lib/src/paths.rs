//! Application root and paths relative to it.
//!
//! The root is the library crate directory (where `app.ini` and `skills/` live), fixed at build
//! time. Set `MEEK_APP_ROOT` to an absolute path to relocate it for an installed binary.
//! Nothing here touches the filesystem and nothing is cached: every call recomputes the root.

use std::path::{Path, PathBuf};

/// Env var that overrides the build-time application root. Must be absolute.
pub const APP_ROOT_ENV: &str = "MEEK_APP_ROOT";

const BUILD_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Absolute path of the application root.
pub fn application_root_path() -> PathBuf {
    match std::env::var_os(APP_ROOT_ENV) {
        Some(v) if !v.is_empty() && Path::new(&v).is_absolute() => PathBuf::from(v),
        Some(v) => {
            log::warn!(
                "ignoring {}={:?}: expected an absolute path",
                APP_ROOT_ENV,
                v
            );
            PathBuf::from(BUILD_ROOT)
        }
        None => PathBuf::from(BUILD_ROOT),
    }
}

/// Join `relative` onto the application root. Does not check that the result exists.
pub fn append_path(relative: impl AsRef<Path>) -> PathBuf {
    application_root_path().join(relative)
}

/// Serializes unit tests that read or change `MEEK_APP_ROOT`.
#[cfg(test)]
pub(crate) fn lock_app_root() -> std::sync::MutexGuard<'static, ()> {
    static APP_ROOT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    APP_ROOT_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
