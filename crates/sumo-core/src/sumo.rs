//! Locating the SUMO installation: binaries, SUMO_HOME, and tool scripts.
//!
//! All lookups go through `_in` variants that take the environment explicitly
//! so tests can exercise resolution without mutating process-wide env vars.

use std::path::{Path, PathBuf};

/// Find a SUMO binary by name.
///
/// Resolution order: `$SUMO_HOME/bin/<name>`, then `$PATH`. Falls back to the
/// bare name so callers still get a runnable command when SUMO is on PATH in
/// a way we cannot see (e.g. shell aliases).
pub fn find_sumo_binary(name: &str) -> PathBuf {
    find_sumo_binary_in(
        name,
        std::env::var_os("SUMO_HOME").map(PathBuf::from).as_deref(),
        std::env::var_os("PATH").as_deref(),
    )
}

pub(crate) fn find_sumo_binary_in(
    name: &str,
    env_home: Option<&Path>,
    path_var: Option<&std::ffi::OsStr>,
) -> PathBuf {
    if let Some(home) = env_home {
        let candidate = home.join("bin").join(name);
        if is_executable(&candidate) {
            return candidate;
        }
    }

    if let Some(path_var) = path_var {
        for dir in std::env::split_paths(path_var) {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return candidate;
            }
        }
    }

    PathBuf::from(name)
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Resolve the SUMO installation root.
///
/// Priority: the `SUMO_HOME` env var, then deriving from the `sumo` binary
/// location when it sits in a `bin/` directory, then the common Linux
/// package path.
pub fn find_sumo_home() -> Option<PathBuf> {
    find_sumo_home_in(
        std::env::var_os("SUMO_HOME").map(PathBuf::from).as_deref(),
        std::env::var_os("PATH").as_deref(),
    )
}

pub(crate) fn find_sumo_home_in(
    env_home: Option<&Path>,
    path_var: Option<&std::ffi::OsStr>,
) -> Option<PathBuf> {
    if let Some(home) = env_home {
        if home.exists() {
            return Some(home.to_path_buf());
        }
    }

    let binary = find_sumo_binary_in("sumo", env_home, path_var);
    if let Some(home) = home_from_binary(&binary) {
        if home.exists() {
            return Some(home);
        }
    }

    let linux_home = PathBuf::from("/usr/share/sumo");
    if linux_home.join("tools").exists() {
        return Some(linux_home);
    }

    None
}

/// Typical layout: `<SUMO_HOME>/bin/sumo`.
fn home_from_binary(binary: &Path) -> Option<PathBuf> {
    if !binary.is_absolute() {
        return None;
    }
    let bin_dir = binary.parent()?;
    if bin_dir.file_name()?.eq_ignore_ascii_case("bin") {
        return bin_dir.parent().map(Path::to_path_buf);
    }
    None
}

/// The SUMO `tools/` directory, when it can be located.
pub fn find_sumo_tools_dir() -> Option<PathBuf> {
    let tools = find_sumo_home()?.join("tools");
    tools.exists().then_some(tools)
}

/// Find a SUMO python tool script (e.g. `randomTrips.py`) under the tools dir.
pub fn find_sumo_tool_script(script_name: &str) -> Option<PathBuf> {
    let script = find_sumo_tools_dir()?.join(script_name);
    script.exists().then_some(script)
}

/// Human-readable summary of how SUMO resolution went, for error messages.
pub fn sumo_diagnostics(binary_name: &str) -> String {
    let binary = find_sumo_binary(binary_name);
    let home = std::env::var("SUMO_HOME").unwrap_or_else(|_| "Not Set".to_string());
    let resolved_home = find_sumo_home()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "not found".to_string());
    let tools = find_sumo_tools_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "not found".to_string());
    format!(
        "Diagnostics:\n- `{binary_name}` resolved to: {}\n- SUMO_HOME (env): {home}\n- SUMO home (resolved): {resolved_home}\n- tools dir: {tools}",
        binary.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;

    #[cfg(unix)]
    fn write_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, "#!/bin/sh\nexit 0\n").expect("write fake executable");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .expect("mark fake executable");
    }

    #[cfg(unix)]
    #[test]
    fn binary_under_sumo_home_bin_wins_over_path() {
        let home = tempfile::tempdir().expect("temp sumo home");
        let bin = home.path().join("bin");
        fs::create_dir(&bin).expect("create bin dir");
        write_executable(&bin.join("sumo"));

        let path_dir = tempfile::tempdir().expect("temp path dir");
        write_executable(&path_dir.path().join("sumo"));

        let path_var = std::env::join_paths([path_dir.path()]).expect("join paths");
        let found = find_sumo_binary_in("sumo", Some(home.path()), Some(&path_var));
        assert_eq!(found, bin.join("sumo"));
    }

    #[cfg(unix)]
    #[test]
    fn binary_falls_back_to_path_search() {
        let path_dir = tempfile::tempdir().expect("temp path dir");
        write_executable(&path_dir.path().join("netconvert"));

        let path_var = std::env::join_paths([path_dir.path()]).expect("join paths");
        let found = find_sumo_binary_in("netconvert", None, Some(&path_var));
        assert_eq!(found, path_dir.path().join("netconvert"));
    }

    #[test]
    fn unresolvable_binary_returns_bare_name() {
        let empty = OsString::new();
        let found = find_sumo_binary_in("definitely-not-a-real-tool", None, Some(&empty));
        assert_eq!(found, PathBuf::from("definitely-not-a-real-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_file_is_skipped() {
        let path_dir = tempfile::tempdir().expect("temp path dir");
        fs::write(path_dir.path().join("sumo"), "not a program").expect("write plain file");

        let path_var = std::env::join_paths([path_dir.path()]).expect("join paths");
        let found = find_sumo_binary_in("sumo", None, Some(&path_var));
        assert_eq!(found, PathBuf::from("sumo"));
    }

    #[test]
    fn env_home_takes_priority_when_it_exists() {
        let home = tempfile::tempdir().expect("temp sumo home");
        let resolved = find_sumo_home_in(Some(home.path()), None);
        assert_eq!(resolved, Some(home.path().to_path_buf()));
    }

    #[cfg(unix)]
    #[test]
    fn home_derived_from_binary_in_bin_directory() {
        let home = tempfile::tempdir().expect("temp sumo home");
        let bin = home.path().join("bin");
        fs::create_dir(&bin).expect("create bin dir");
        write_executable(&bin.join("sumo"));

        let path_var = std::env::join_paths([&bin]).expect("join paths");
        let resolved = find_sumo_home_in(None, Some(&path_var));
        assert_eq!(resolved, Some(home.path().to_path_buf()));
    }

    #[test]
    fn stale_env_home_is_ignored() {
        let stale = PathBuf::from("/definitely/not/a/real/sumo/home");
        let empty = OsString::new();
        let resolved = find_sumo_home_in(Some(&stale), Some(&empty));
        // May still resolve via the system path on machines with SUMO
        // installed, but never to the stale env value.
        assert_ne!(resolved, Some(stale));
    }

    #[test]
    fn diagnostics_mention_binary_and_home() {
        let report = sumo_diagnostics("sumo");
        assert!(report.contains("`sumo` resolved to:"));
        assert!(report.contains("SUMO_HOME (env):"));
    }
}
