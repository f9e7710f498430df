//! In-memory [`RemoteStorage`] with call recording and fault injection.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use davpush_remote::{RemoteError, RemotePath, RemoteStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Exists,
    Mkdir,
    Upload,
    Rename,
    Delete,
    FreeSpace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Exists(String),
    Mkdir(String),
    Upload(String),
    Rename {
        from: String,
        to: String,
        overwrite: bool,
    },
    Delete(String),
    FreeSpace,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Inject {
    Status(u16),
    ParentMissing,
    AlreadyExists,
    Protocol,
    Timeout,
    /// Someone else creates the directory just before our mkdir lands.
    CreatedConcurrently,
}

struct Rule {
    op: Op,
    path: Option<String>,
    inject: Inject,
    once: bool,
}

struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, u64>,
    free: i64,
    calls: Vec<Call>,
    rules: Vec<Rule>,
}

pub(crate) struct MockStorage {
    state: Mutex<State>,
}

fn parent_of(path: &str) -> Option<String> {
    RemotePath::parse(path)
        .ok()
        .and_then(|p| p.parent())
        .map(|p| p.as_str().to_string())
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                dirs: BTreeSet::from(["/".to_string()]),
                files: BTreeMap::new(),
                free: -1,
                calls: Vec::new(),
                rules: Vec::new(),
            }),
        }
    }

    pub fn without_root(self) -> Self {
        self.state.lock().unwrap().dirs.clear();
        self
    }

    /// Adds `path` and all of its ancestors.
    pub fn with_dir(self, path: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for dir in RemotePath::parse(path).unwrap().ancestors() {
                state.dirs.insert(dir.as_str().to_string());
            }
        }
        self
    }

    pub fn with_file(self, path: &str, size: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), size);
        self
    }

    pub fn with_free_space(self, free: i64) -> Self {
        self.state.lock().unwrap().free = free;
        self
    }

    /// Injects a failure on every matching call.
    pub fn fail(self, op: Op, path: Option<&str>, inject: Inject) -> Self {
        self.add_rule(op, path, inject, false)
    }

    /// Injects a failure on the first matching call only.
    pub fn fail_once(self, op: Op, path: Option<&str>, inject: Inject) -> Self {
        self.add_rule(op, path, inject, true)
    }

    fn add_rule(self, op: Op, path: Option<&str>, inject: Inject, once: bool) -> Self {
        self.state.lock().unwrap().rules.push(Rule {
            op,
            path: path.map(str::to_string),
            inject,
            once,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn mkdir_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Mkdir(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn dirs(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().dirs.clone()
    }

    pub fn files(&self) -> BTreeMap<String, u64> {
        self.state.lock().unwrap().files.clone()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    fn record(&self, call: Call, op: Op, path: &RemotePath) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);

        let hit = state.rules.iter().position(|r| {
            r.op == op && r.path.as_deref().is_none_or(|p| p == path.as_str())
        });
        let Some(index) = hit else {
            return Ok(());
        };
        let inject = state.rules[index].inject;
        if state.rules[index].once {
            state.rules.remove(index);
        }

        Err(match inject {
            Inject::Status(code) => RemoteError::status(code, ""),
            Inject::ParentMissing => RemoteError::ParentMissing(path.clone()),
            Inject::AlreadyExists => RemoteError::AlreadyExists(path.clone()),
            Inject::Protocol => RemoteError::Protocol("malformed multistatus body".into()),
            Inject::Timeout => RemoteError::Timeout(Duration::from_secs(30)),
            Inject::CreatedConcurrently => {
                state.dirs.insert(path.as_str().to_string());
                RemoteError::AlreadyExists(path.clone())
            }
        })
    }
}

impl RemoteStorage for MockStorage {
    fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        self.record(Call::Exists(path.to_string()), Op::Exists, path)?;
        let state = self.state.lock().unwrap();
        Ok(state.dirs.contains(path.as_str()) || state.files.contains_key(path.as_str()))
    }

    fn mkdir(&self, path: &RemotePath) -> Result<(), RemoteError> {
        self.record(Call::Mkdir(path.to_string()), Op::Mkdir, path)?;
        let mut state = self.state.lock().unwrap();
        if state.dirs.contains(path.as_str()) || state.files.contains_key(path.as_str()) {
            return Err(RemoteError::AlreadyExists(path.clone()));
        }
        match path.parent() {
            Some(parent) if state.dirs.contains(parent.as_str()) => {
                state.dirs.insert(path.to_string());
                Ok(())
            }
            _ => Err(RemoteError::ParentMissing(path.clone())),
        }
    }

    fn upload_file(&self, remote: &RemotePath, local: &Path) -> Result<(), RemoteError> {
        self.record(Call::Upload(remote.to_string()), Op::Upload, remote)?;
        let size = std::fs::metadata(local)?.len();
        let mut state = self.state.lock().unwrap();
        match parent_of(remote.as_str()) {
            Some(parent) if state.dirs.contains(&parent) => {
                state.files.insert(remote.to_string(), size);
                Ok(())
            }
            _ => Err(RemoteError::ParentMissing(remote.clone())),
        }
    }

    fn rename(
        &self,
        from: &RemotePath,
        to: &RemotePath,
        overwrite: bool,
    ) -> Result<(), RemoteError> {
        let call = Call::Rename {
            from: from.to_string(),
            to: to.to_string(),
            overwrite,
        };
        self.record(call, Op::Rename, to)?;

        let mut state = self.state.lock().unwrap();
        let Some(size) = state.files.get(from.as_str()).copied() else {
            return Err(RemoteError::NotFound(from.clone()));
        };
        match parent_of(to.as_str()) {
            Some(parent) if state.dirs.contains(&parent) => {}
            _ => return Err(RemoteError::ParentMissing(to.clone())),
        }
        if !overwrite && state.files.contains_key(to.as_str()) {
            return Err(RemoteError::AlreadyExists(to.clone()));
        }
        state.files.remove(from.as_str());
        state.files.insert(to.to_string(), size);
        Ok(())
    }

    fn delete(&self, path: &RemotePath) -> Result<(), RemoteError> {
        self.record(Call::Delete(path.to_string()), Op::Delete, path)?;
        let mut state = self.state.lock().unwrap();
        if state.files.remove(path.as_str()).is_some() || state.dirs.remove(path.as_str()) {
            Ok(())
        } else {
            Err(RemoteError::NotFound(path.clone()))
        }
    }

    fn free_space_bytes(&self) -> Result<i64, RemoteError> {
        self.record(Call::FreeSpace, Op::FreeSpace, &RemotePath::root())?;
        Ok(self.state.lock().unwrap().free)
    }
}
