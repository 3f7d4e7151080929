//! Prompt Loader
//!
//! Loads prompt templates from the configured directory or falls back to
//! embedded defaults.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Values available to prompt templates
///
/// Every field is optional so one context type serves all templates; unset
/// fields render as empty strings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    /// The user's chat message
    pub question: String,
    pub procedure_title: Option<String>,
    pub phase_title: Option<String>,
    pub step_title: Option<String>,
    pub responsible_role: Option<String>,
    pub task_description: Option<String>,
    pub required_documents: Option<String>,
    /// Table descriptions for the SQL chain
    pub schema: Option<String>,
    /// Generated SQL
    pub query: Option<String>,
    /// Rendered query result or failure text
    pub sql_response: Option<String>,
}

impl PromptContext {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory from `assistant.prompts-dir`
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that prefers templates in `user_dir` when it exists
    pub fn new(user_dir: Option<PathBuf>) -> Self {
        let user_dir = user_dir.filter(|dir| dir.exists());
        debug!(?user_dir, "PromptLoader::new: called");

        Self {
            hbs: Self::engine(),
            user_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; SQL and schema text must reach the model untouched
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks `{user_dir}/{name}.pmt` first, then the embedded fallback.
    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!("Loading prompt from user override: {:?}", path);
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!("Using embedded prompt: {}", name);
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        let template = self.load_template(template_name)?;
        debug!(%template_name, "render: called");

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// The system prompt used for every completion
    pub fn system_prompt(&self) -> Result<String> {
        self.load_template("assistant-system")
    }
}
