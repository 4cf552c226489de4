//! In-memory package ecosystem.
//!
//! Handles are cheap clones over shared state, so a test can keep one
//! handle for inspection while the executor owns another.

use anyhow::{bail, Result};
use pkc_execution::{PackageSource, SourceInvokeToken};
use pkc_schemas::{ActionKind, ActionResult, InstallStatus, ScannedPackage, Source};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Scan,
    Install(Vec<String>),
    Remove { names: Vec<String>, purge: bool },
}

impl SourceCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, SourceCall::Scan)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    installed: BTreeMap<String, InstallStatus>,
    failing: BTreeSet<String>,
    unavailable: bool,
    scan_error: Option<String>,
    calls: Vec<SourceCall>,
}

#[derive(Debug, Clone)]
pub struct FakeSource {
    source: Source,
    state: Rc<RefCell<FakeState>>,
}

impl FakeSource {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            state: Rc::new(RefCell::new(FakeState::default())),
        }
    }

    pub fn with_manual(self, names: &[&str]) -> Self {
        self.with_status(names, InstallStatus::Manual)
    }

    pub fn with_auto(self, names: &[&str]) -> Self {
        self.with_status(names, InstallStatus::AutoInstalled)
    }

    fn with_status(self, names: &[&str], status: InstallStatus) -> Self {
        {
            let mut st = self.state.borrow_mut();
            for n in names {
                st.installed.insert(n.to_string(), status);
            }
        }
        self
    }

    /// Mutations of these names fail.
    pub fn failing(self, names: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .failing
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Same as [`FakeSource::failing`], through a shared handle.
    pub fn set_failing(&self, name: &str) {
        self.state.borrow_mut().failing.insert(name.to_string());
    }

    pub fn clear_failing(&self, name: &str) {
        self.state.borrow_mut().failing.remove(name);
    }

    pub fn unavailable(self) -> Self {
        self.state.borrow_mut().unavailable = true;
        self
    }

    pub fn scan_fails(self, error: &str) -> Self {
        self.state.borrow_mut().scan_error = Some(error.to_string());
        self
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.state.borrow().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<SourceCall> {
        self.calls().into_iter().filter(SourceCall::is_mutation).collect()
    }

    pub fn installed(&self) -> BTreeSet<String> {
        self.state.borrow().installed.keys().cloned().collect()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.state.borrow().installed.contains_key(name)
    }
}

impl PackageSource for FakeSource {
    fn source(&self) -> Source {
        self.source
    }

    fn is_available(&self) -> bool {
        !self.state.borrow().unavailable
    }

    fn scan(&self) -> Result<Vec<ScannedPackage>> {
        let mut st = self.state.borrow_mut();
        st.calls.push(SourceCall::Scan);
        if let Some(err) = &st.scan_error {
            bail!("{err}");
        }
        Ok(st
            .installed
            .iter()
            .map(|(n, status)| ScannedPackage::new(self.source, n.clone(), "1.0", *status))
            .collect())
    }

    fn install(&self, names: &[String], _token: &SourceInvokeToken) -> Vec<ActionResult> {
        let mut st = self.state.borrow_mut();
        st.calls.push(SourceCall::Install(names.to_vec()));
        names
            .iter()
            .map(|n| {
                if st.failing.contains(n) {
                    ActionResult::failure(ActionKind::Install, self.source, n.clone(), format!("E: Unable to locate package {n}"))
                } else {
                    st.installed.insert(n.clone(), InstallStatus::Manual);
                    ActionResult::success(ActionKind::Install, self.source, n.clone())
                }
            })
            .collect()
    }

    fn remove(&self, names: &[String], purge: bool, _token: &SourceInvokeToken) -> Vec<ActionResult> {
        let kind = if purge { ActionKind::Purge } else { ActionKind::Remove };
        let mut st = self.state.borrow_mut();
        st.calls.push(SourceCall::Remove {
            names: names.to_vec(),
            purge,
        });
        names
            .iter()
            .map(|n| {
                if st.failing.contains(n) {
                    ActionResult::failure(kind, self.source, n.clone(), "dpkg: error processing package")
                } else if st.installed.remove(n).is_some() {
                    ActionResult::success(kind, self.source, n.clone())
                } else {
                    ActionResult::failure(kind, self.source, n.clone(), format!("package {n} is not installed"))
                }
            })
            .collect()
    }
}
