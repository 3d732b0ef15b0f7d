use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::{debug, warn};

use super::PasswordService;
use crate::error::ServiceError;
use crate::models::entry::{EntryDetail, EntrySummary};

#[derive(Debug, Clone)]
pub struct PassCommand {
    store: PathBuf,
    program: String,
}

impl PassCommand {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
            program: "pass".to_string(),
        }
    }

    pub fn from_env() -> Self {
        let store = env::var_os("PASSWORD_STORE_DIR")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".password-store")))
            .unwrap_or_else(|| PathBuf::from(".password-store"));
        Self::new(store)
    }

    fn run(&self, args: &[&str], input: Option<&str>) -> Result<String, ServiceError> {
        debug!("Running {} {:?}", self.program, args);
        let mut child = Command::new(&self.program)
            .args(args)
            .env("PASSWORD_STORE_DIR", &self.store)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ServiceError::Failed(format!("could not run {}: {}", self.program, e)))?;

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(ServiceError::Failed(format!("could not write to {}: {}", self.program, e)));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ServiceError::Failed(e.to_string()))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("{} {:?} exited with {}", self.program, args, output.status);
            Err(ServiceError::Rejected(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr
            }))
        }
    }

    fn insert(&self, path: &str, content: &str, force: bool) -> Result<(), ServiceError> {
        let mut args = vec!["insert", "--multiline"];
        if force {
            args.push("--force");
        }
        args.push(path);
        self.run(&args, Some(content)).map(|_| ())
    }
}

impl PasswordService for PassCommand {
    fn is_initialized(&self) -> bool {
        self.store.join(".gpg-id").is_file()
    }

    fn get_all_entries(&self) -> Result<Vec<EntrySummary>, ServiceError> {
        let mut paths = Vec::new();
        collect_entries(&self.store, &self.store, &mut paths)
            .map_err(|e| ServiceError::Failed(e.to_string()))?;
        paths.sort();
        Ok(paths.iter().map(|p| EntrySummary::from_path(p)).collect())
    }

    fn search_entries(&self, query: &str) -> Result<Vec<EntrySummary>, ServiceError> {
        let query = query.to_lowercase();
        Ok(self
            .get_all_entries()?
            .into_iter()
            .filter(|entry| entry.path.to_lowercase().contains(&query))
            .collect())
    }

    fn get_entry_details(&self, path: &str) -> Result<EntryDetail, ServiceError> {
        let raw = self.run(&["show", path], None)?;
        Ok(EntryDetail::parse(path, &raw))
    }

    fn create_entry(&self, path: &str, content: &str) -> Result<String, ServiceError> {
        if self.store.join(format!("{}.gpg", path)).exists() {
            return Err(ServiceError::Rejected(format!("{} already exists", path)));
        }
        self.insert(path, content, false)?;
        Ok(format!("Created {}", path))
    }

    fn update_entry(&self, path: &str, content: &str) -> Result<String, ServiceError> {
        self.insert(path, content, true)?;
        Ok(format!("Updated {}", path))
    }

    fn sync_pull(&self) -> Result<String, ServiceError> {
        self.run(&["git", "pull"], None)
            .map(|out| if out.is_empty() { "Pulled".to_string() } else { out })
    }

    fn sync_push(&self) -> Result<String, ServiceError> {
        self.run(&["git", "push"], None)
            .map(|out| if out.is_empty() { "Pushed".to_string() } else { out })
    }
}

fn collect_entries(root: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_entries(root, &path, out)?;
        } else if path.extension().map_or(false, |ext| ext == "gpg") {
            if let Ok(relative) = path.with_extension("").strip_prefix(root) {
                out.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    Ok(())
}
