//! Node inspection: one selector, one condition, plus change tracking.

use log::{debug, trace};
use scraper::Selector;

use crate::config::NodeInspectorDefinition;
use crate::document::WebDocument;
use crate::error::{Result, StakeoutError};
use crate::inspect::condition::{Condition, InspectContext};

/// A rule bound to one document selector and one condition.
///
/// Owns the mutable last-observed text/HTML snapshots of its node, consulted
/// only for `anyChange` conditions. Created once per watch and mutated on
/// every inspection until the watch is torn down.
#[derive(Debug)]
pub struct NodeInspector {
    selector: Selector,
    selector_text: String,
    context: InspectContext,
    name: Option<String>,
    condition: Condition,
    last_text: Option<String>,
    last_html: Option<String>,
}

impl NodeInspector {
    pub fn new(selector: &str, context: InspectContext, condition: Condition) -> Result<Self> {
        let compiled = Selector::parse(selector)
            .map_err(|e| StakeoutError::Config(format!("invalid selector '{selector}': {e}")))?;
        Ok(Self {
            selector: compiled,
            selector_text: selector.to_string(),
            context,
            name: None,
            condition,
            last_text: None,
            last_html: None,
        })
    }

    pub fn from_definition(def: &NodeInspectorDefinition) -> Result<Self> {
        let mut inspector = Self::new(&def.selector, def.context, Condition::from_definition(&def.condition)?)?;
        inspector.name = def.name.clone();
        Ok(inspector)
    }

    /// The log label: the configured name, or the selector.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.selector_text)
    }

    /// Evaluate this rule against a document.
    ///
    /// An absent selector short-circuits to `negated` without touching the
    /// stored snapshots; any configured condition is skipped. Otherwise the
    /// snapshots are refreshed unconditionally, even when an operator or
    /// match rule decides the verdict, so change history never goes stale.
    pub fn inspect(&mut self, document: &WebDocument) -> bool {
        let Some(capture) = document.capture(&self.selector) else {
            debug!("{}: selector absent, verdict {}", self.label(), self.condition.negated);
            return self.condition.negated;
        };

        let previous_text = self.last_text.replace(capture.text.clone());
        let previous_html = self.last_html.replace(capture.html.clone());

        if self.condition.any_change {
            let (previous, current) = match self.context {
                InspectContext::Text => (previous_text, &capture.text),
                InspectContext::Html => (previous_html, &capture.html),
            };
            // First observation is never a change; an empty previous
            // snapshot still counts as observed.
            let changed = previous.is_some_and(|p| p != *current);
            let verdict = self.condition.negated != changed;
            trace!("{}: anyChange={} verdict={}", self.label(), changed, verdict);
            return verdict;
        }

        let evaluatee = match self.context {
            InspectContext::Text => &capture.text,
            InspectContext::Html => &capture.html,
        };
        let verdict = self.condition.verdict(evaluatee);
        trace!("{}: verdict={}", self.label(), verdict);
        verdict
    }
}
