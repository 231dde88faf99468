//! Condition evaluation over fetched documents.
//!
//! - `condition`: operators, match rules, and numeric coercion
//! - `node`: a single selector/condition pair with change tracking
//! - `document`: ALL/ANY reduction across node inspectors

mod condition;
mod document;
mod node;

pub use condition::{ComparisonOperator, Condition, InspectContext, MatchRule, Operand, coerce_numeric};
pub use document::WebDocumentInspector;
pub use node::NodeInspector;
