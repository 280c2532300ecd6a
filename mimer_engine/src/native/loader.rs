use std::path::{Path, PathBuf};

/// Environment variable naming the Mimer API shared library explicitly.
pub const LIBRARY_PATH_ENV: &str = "MIMERAPI_PATH";

#[cfg(target_os = "macos")]
const PLATFORM_LIBRARIES: &[&str] = &["/usr/local/lib/libmimerapi.dylib", "libmimerapi.dylib"];

#[cfg(windows)]
const PLATFORM_LIBRARIES: &[&str] = &["mimapi64.dll"];

#[cfg(not(any(target_os = "macos", windows)))]
const PLATFORM_LIBRARIES: &[&str] = &["libmimerapi.so"];

fn read_library_path_from_env() -> Option<String> {
    std::env::var(LIBRARY_PATH_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Orders the places to look for the library: explicit path, then the
/// environment override, then the platform's conventional names.
fn resolve_candidates(explicit: Option<&Path>, env_override: Option<String>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    if let Some(path) = env_override {
        return vec![PathBuf::from(path)];
    }
    PLATFORM_LIBRARIES.iter().map(PathBuf::from).collect()
}

pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    resolve_candidates(explicit, read_library_path_from_env())
}
