//! Script Templating
//!
//! Text substitution for the scripts run by the model download step.

pub mod script;

pub use script::{render, ScriptContext};
