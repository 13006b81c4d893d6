use std::path::PathBuf;

/// Read a non-empty environment variable
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get a path from an environment variable or use the default
pub fn env_path(key: &str, default: PathBuf) -> PathBuf {
    env_string(key).map(PathBuf::from).unwrap_or(default)
}
