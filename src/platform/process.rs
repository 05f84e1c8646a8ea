//! Process table backed by `sysinfo`.
//!
//! Lookups refresh a single PID instead of scanning the whole table, so a
//! ten-hop walk costs ten small syscalls.

use super::bundle_identifier;
use crate::resolve::process_tree::{AppIdentity, ProcessEntry, ProcessTable, bundle_path_from_exe};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};
use tracing::trace;

pub struct SystemProcessTable {
    sys: RefCell<System>,
    /// Bundle path → identifier. Bundles do not change identity while running.
    bundle_ids: RefCell<HashMap<PathBuf, Option<String>>>,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            sys: RefCell::new(System::new()),
            bundle_ids: RefCell::new(HashMap::new()),
        }
    }

    fn bundle_id_for(&self, bundle_path: PathBuf) -> Option<String> {
        if let Some(cached) = self.bundle_ids.borrow().get(&bundle_path) {
            return cached.clone();
        }
        let id = bundle_identifier(&bundle_path);
        self.bundle_ids.borrow_mut().insert(bundle_path, id.clone());
        id
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn lookup(&self, pid: u32) -> Option<ProcessEntry> {
        let sys_pid = Pid::from_u32(pid);
        let (parent, executable, exe) = {
            let mut sys = self.sys.borrow_mut();
            let refresh = ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet);
            if !sys.refresh_process_specifics(sys_pid, refresh) {
                trace!(pid, "process not found");
                return None;
            }
            let process = sys.process(sys_pid)?;
            (
                process.parent().map(|p| p.as_u32()),
                process.name().to_string(),
                process.exe().map(|p| p.to_path_buf()),
            )
        };

        let mut identity = AppIdentity::from_exe_path(&executable, exe.as_deref());
        identity.bundle_id = exe
            .as_deref()
            .and_then(bundle_path_from_exe)
            .and_then(|bundle| self.bundle_id_for(bundle));

        Some(ProcessEntry {
            pid,
            parent,
            identity,
        })
    }
}
