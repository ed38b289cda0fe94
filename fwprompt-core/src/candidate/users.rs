//! Local user name lookup

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Resolves numeric user ids to account names
pub trait UserDirectory: Send + Sync {
    fn user_name(&self, uid: u32) -> Option<String>;
}

/// Lookup backed by a passwd(5) formatted file
#[derive(Debug, Clone)]
pub struct PasswdFile {
    path: PathBuf,
}

impl PasswdFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for PasswdFile {
    fn default() -> Self {
        Self::new("/etc/passwd")
    }
}

impl UserDirectory for PasswdFile {
    fn user_name(&self, uid: u32) -> Option<String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!("Cannot read {:?}: {}", self.path, e);
                return None;
            }
        };

        contents.lines().find_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let entry_uid: u32 = fields.nth(1)?.parse().ok()?;
            (entry_uid == uid && !name.is_empty()).then(|| name.to_string())
        })
    }
}

impl UserDirectory for HashMap<u32, String> {
    fn user_name(&self, uid: u32) -> Option<String> {
        self.get(&uid).cloned()
    }
}
