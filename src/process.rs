use {
    log::*,
    std::{
        env,
        ffi::OsStr,
        fmt,
        path::{Path, PathBuf},
    },
    tokio::process::Command,
};

/// Log filter handed to children when this process has no RUST_LOG of its own.
pub const DEFAULT_CHILD_RUST_LOG: &str = "solana=info,solana_core::repair=debug";

/// Environment every external program is started with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildEnv {
    rust_log: String,
    rust_backtrace: bool,
}

impl Default for ChildEnv {
    fn default() -> Self {
        Self {
            rust_log: DEFAULT_CHILD_RUST_LOG.to_string(),
            rust_backtrace: true,
        }
    }
}

impl ChildEnv {
    pub fn from_rust_log(rust_log: Option<String>) -> Self {
        match rust_log {
            Some(rust_log) if !rust_log.trim().is_empty() => Self {
                rust_log,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn rust_log(&self) -> &str {
        &self.rust_log
    }

    pub fn vars(&self) -> Vec<(&'static str, String)> {
        let backtrace = if self.rust_backtrace { "1" } else { "0" };
        vec![
            ("RUST_LOG", self.rust_log.clone()),
            ("RUST_BACKTRACE", backtrace.to_string()),
        ]
    }

    /// Builds a command for `program` carrying this environment. The child is
    /// killed if the future waiting on it is dropped.
    pub fn command<S: AsRef<OsStr>>(&self, program: S) -> Command {
        let mut command = Command::new(program);
        command.envs(self.vars()).kill_on_drop(true);
        command
    }
}

impl fmt::Display for ChildEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RUST_LOG={} RUST_BACKTRACE={}",
            self.rust_log,
            if self.rust_backtrace { 1 } else { 0 }
        )
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Resolves `program` the way a shell would. Names containing a path
/// separator are checked directly, bare names are searched for in
/// `search_path` (a `PATH`-style list). Falls back to the process `PATH`
/// when `search_path` is `None`.
pub fn locate_program(program: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let process_path = env::var_os("PATH");
    let search_path = search_path.or(process_path.as_deref())?;
    let found = env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|path| is_executable(path));
    trace!("resolved {program} -> {found:?}");
    found
}

#[cfg(test)]
mod tests {
    use {super::*, std::fs};

    #[cfg(unix)]
    fn write_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn child_env_defaults_force_backtrace() {
        let env = ChildEnv::from_rust_log(None);
        assert_eq!(env.rust_log(), DEFAULT_CHILD_RUST_LOG);
        assert!(env.vars().contains(&("RUST_BACKTRACE", "1".to_string())));
    }

    #[test]
    fn child_env_forwards_rust_log() {
        let env = ChildEnv::from_rust_log(Some("debug".to_string()));
        assert_eq!(env.rust_log(), "debug");
        assert!(env.vars().contains(&("RUST_BACKTRACE", "1".to_string())));

        let blank = ChildEnv::from_rust_log(Some("  ".to_string()));
        assert_eq!(blank, ChildEnv::default());
    }

    #[cfg(unix)]
    #[test]
    fn locates_program_on_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let expected = write_executable(dir.path(), "solana-gossip");

        let found = locate_program("solana-gossip", Some(dir.path().as_os_str()));
        assert_eq!(found, Some(expected));
    }

    #[cfg(unix)]
    #[test]
    fn ignores_non_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("solana-gossip"), "not a program").unwrap();

        assert_eq!(
            locate_program("solana-gossip", Some(dir.path().as_os_str())),
            None
        );
    }

    #[cfg(unix)]
    #[test]
    fn checks_explicit_paths_directly() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_executable(dir.path(), "repair-tests.sh");
        let empty = tempfile::tempdir().unwrap();

        let found = locate_program(script.to_str().unwrap(), Some(empty.path().as_os_str()));
        assert_eq!(found, Some(script));

        let missing = dir.path().join("missing.sh");
        assert_eq!(locate_program(missing.to_str().unwrap(), None), None);
    }

    #[test]
    fn missing_program_is_not_found() {
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(
            locate_program("solana-gossip", Some(empty.path().as_os_str())),
            None
        );
        assert_eq!(locate_program("", None), None);
    }
}
