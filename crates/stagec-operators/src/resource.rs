//! Side resources attached to operators (lookup tables and the like).
//!
//! A task sets every distinct resource up once before the first record and
//! cleans it up after the last one. Operators hold `ResourceHandle`s and may
//! only read from a table between those two calls.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use stagec_core::flow::ResourceDesc;

use crate::traits::OpError;

pub type ResourceHandle = Rc<RefCell<SideTable>>;

/// In-memory key/value table loaded from a resource description.
///
/// Supported kinds: `table` (each parameter is one `key -> value` entry).
#[derive(Debug)]
pub struct SideTable {
    desc: ResourceDesc,
    entries: Option<BTreeMap<String, String>>,
}

impl SideTable {
    pub fn new(desc: ResourceDesc) -> Self {
        Self {
            desc,
            entries: None,
        }
    }

    pub fn handle(desc: ResourceDesc) -> ResourceHandle {
        Rc::new(RefCell::new(Self::new(desc)))
    }

    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    pub fn is_ready(&self) -> bool {
        self.entries.is_some()
    }

    pub fn setup(&mut self) -> Result<(), OpError> {
        match self.desc.kind.as_str() {
            "table" => {
                self.entries = Some(self.desc.params.clone());
                Ok(())
            }
            other => Err(OpError::Build(format!(
                "resource '{}' has unsupported kind '{}'",
                self.desc.name, other
            ))),
        }
    }

    pub fn cleanup(&mut self) {
        self.entries = None;
    }

    pub fn get(&self, key: &str) -> Result<Option<&str>, OpError> {
        let entries = self.entries.as_ref().ok_or_else(|| {
            OpError::Exec(format!("resource '{}' read outside setup/cleanup", self.desc.name))
        })?;
        Ok(entries.get(key).map(|s| s.as_str()))
    }
}
