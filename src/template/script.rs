//! Download Script Templating
//!
//! Renders the init-step script with exactly three variables:
//! `model_name`, `model_url` and `model_dir`. Unknown variables are errors,
//! never empty strings.

use crate::error::Result;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

/// Values available to download scripts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptContext {
    /// Model name as known to the engine
    pub model_name: String,
    /// Model source URL
    pub model_url: String,
    /// Mount path of the models storage
    pub model_dir: String,
}

/// Render a download script; empty templates render to an empty script
pub fn render(template: &str, vars: &ScriptContext) -> Result<String> {
    if template.is_empty() {
        return Ok(String::new());
    }

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);

    Ok(env.render_str(template, vars)?)
}
