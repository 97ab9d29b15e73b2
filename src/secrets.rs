//! Credentials handed to the assistant
//!
//! A secret comes from the environment when set there, otherwise from the
//! configured `secrets.command` (e.g. `op read op://dev/{name}/credential`)
//! with `{name}` replaced by the variable name. Values are never logged.

use crate::config::SecretSettings;
use crate::error::StackError;
use crate::shell_exec::{ShellConfig, failure_text, run};
use crate::styling::{eprintln, shell_quote, warning_message};

pub trait SecretProvider {
    /// Value of `name`, or `None` when no source has it.
    fn get(&self, name: &str) -> anyhow::Result<Option<String>>;
}

pub struct EnvOrCommand<'a> {
    settings: &'a SecretSettings,
    lookup: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> EnvOrCommand<'a> {
    pub fn new(settings: &'a SecretSettings) -> Self {
        Self::with_lookup(settings, |name| std::env::var(name).ok())
    }

    pub fn with_lookup(
        settings: &'a SecretSettings,
        lookup: impl Fn(&str) -> Option<String> + 'a,
    ) -> Self {
        Self {
            settings,
            lookup: Box::new(lookup),
        }
    }
}

/// The configured command with `{name}` filled in (shell-quoted).
fn expand_command(template: &str, name: &str) -> String {
    template.replace("{name}", &shell_quote(name))
}

impl SecretProvider for EnvOrCommand<'_> {
    fn get(&self, name: &str) -> anyhow::Result<Option<String>> {
        if let Some(value) = (self.lookup)(name).filter(|v| !v.is_empty()) {
            return Ok(Some(value));
        }
        let Some(template) = &self.settings.command else {
            return Ok(None);
        };

        let command = expand_command(template, name);
        let mut cmd = ShellConfig::get().command(&command);
        let output = run(&mut cmd, Some(name))?;
        if !output.status.success() {
            return Err(StackError::CommandFailed {
                command: format!("secrets command for {name}"),
                error: failure_text(&output),
            }
            .into());
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!value.is_empty()).then_some(value))
    }
}

/// Resolve every name in `names`, warning about (and skipping) the ones no
/// source provides.
pub fn resolve_all(
    provider: &dyn SecretProvider,
    names: &[String],
) -> anyhow::Result<Vec<(String, String)>> {
    let mut resolved = Vec::new();
    for name in names {
        match provider.get(name)? {
            Some(value) => resolved.push((name.clone(), value)),
            None => eprintln!(
                "{}",
                warning_message(format!("{name} is not set; the assistant may not authenticate"))
            ),
        }
    }
    Ok(resolved)
}
