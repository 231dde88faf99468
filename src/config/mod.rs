//! Configuration loading for watch definitions.

mod watches;

pub use watches::{
    ConditionDefinition, NodeInspectorDefinition, WatchDefaults, WatchDefinition, load_watch_definitions,
};
