use std::path::PathBuf;

/// XDG app name used for all orchestrator state and config paths.
pub const APP_NAME: &str = "code-orchestrator";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Directory holding `config.toml`.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Directory holding per-project session state.
pub fn state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

/// Fallback state directory when the platform has no standard state dir
/// (e.g. sandboxed test environments without `HOME`).
pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

/// Resolved state directory, falling back to a temp-dir location.
pub fn resolved_state_dir() -> PathBuf {
    state_dir().unwrap_or_else(state_dir_fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_state_dir_never_panics() {
        let _ = resolved_state_dir();
    }

    #[test]
    fn fallback_is_rooted_under_temp_dir() {
        let fallback = state_dir_fallback();
        assert!(fallback.starts_with(std::env::temp_dir()));
    }
}
