//! Document-level verdicts: ALL/ANY groups of node inspectors.

use log::debug;

use crate::config::NodeInspectorDefinition;
use crate::document::WebDocument;
use crate::error::{Result, StakeoutError};
use crate::inspect::node::NodeInspector;

/// Combines node inspectors into a single pass/fail verdict per document.
///
/// The `all` group must pass unanimously; the `any` group needs one passer
/// (an empty `any` group is vacuously satisfied). Every inspector runs on
/// every consulted document regardless of how early the verdict is decided,
/// so `anyChange` snapshots advance in lockstep.
pub struct WebDocumentInspector {
    all: Vec<NodeInspector>,
    any: Vec<NodeInspector>,
}

impl WebDocumentInspector {
    pub fn new(all: Vec<NodeInspector>, any: Vec<NodeInspector>) -> Self {
        Self { all, any }
    }

    pub fn from_definitions(
        all: &[NodeInspectorDefinition],
        any: &[NodeInspectorDefinition],
    ) -> Result<Self> {
        let all = all.iter().map(NodeInspector::from_definition).collect::<Result<Vec<_>>>()?;
        let any = any.iter().map(NodeInspector::from_definition).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(all, any))
    }

    /// Run every inspector against the document and reduce to one verdict.
    pub fn inspect(&mut self, document: &WebDocument) -> Result<bool> {
        if self.all.is_empty() && self.any.is_empty() {
            return Err(StakeoutError::NoInspectors);
        }

        let mut all_pass = true;
        for inspector in &mut self.all {
            let verdict = inspector.inspect(document);
            debug!("all[{}]: {}", inspector.label(), verdict);
            all_pass &= verdict;
        }

        let mut any_pass = self.any.is_empty();
        for inspector in &mut self.any {
            let verdict = inspector.inspect(document);
            debug!("any[{}]: {}", inspector.label(), verdict);
            any_pass |= verdict;
        }

        Ok(all_pass && any_pass)
    }
}
