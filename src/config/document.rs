//! Configuration document types
//!
//! Aliases and env entries accept both a short string form and an object
//! form. Both are decoded through an untagged `Raw*` enum and then converted
//! into typed definitions, so the rest of the crate never inspects raw values.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Prefix marking a function body in a command map
pub const FUNCTION_PREFIX: &str = "__dirvana_function__:";

static ENV_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

static COMMAND_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^\s'"=/$`\\;|&<>()]+$"#).expect("valid regex"));

/// One configuration file, or the fold of several
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub aliases: BTreeMap<String, AliasSpec>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub functions: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub env: BTreeMap<String, EnvSpec>,

    /// Discard every ancestor contribution when merged
    #[serde(default)]
    pub local_only: bool,

    /// Skip the global config layer for this hierarchy
    #[serde(default)]
    pub ignore_global: bool,
}

/// A section written as `functions:` with every entry commented out is null
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Result of folding a chain of documents
pub type MergedConfig = ConfigDocument;

/// A single alias definition
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawAlias")]
pub struct AliasSpec {
    pub command: String,

    /// `None` lets the completion engine detect completion from the command
    pub completion: Option<Completion>,

    /// Opaque condition tree, evaluated only when the alias runs
    pub when: Option<serde_json::Value>,

    /// Command to run instead when `when` fails
    pub fallback: Option<String>,
}

impl AliasSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            completion: None,
            when: None,
            fallback: None,
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.when.is_some()
    }
}

/// How shell completion is provided for an alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// Complete as if the given command was typed
    Inherit(String),
    /// Explicit completion scripts per shell
    Script {
        bash: Option<String>,
        zsh: Option<String>,
    },
    Disabled,
}

/// An environment variable definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEnv")]
pub enum EnvSpec {
    Static(String),
    /// Value is the stdout of a shell command; needs approval before running
    Shell(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAlias {
    Command(String),
    Detailed {
        command: String,
        #[serde(default)]
        completion: Option<RawCompletion>,
        #[serde(default)]
        when: Option<serde_json::Value>,
        #[serde(default, rename = "else")]
        fallback: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCompletion {
    Toggle(bool),
    Inherit(String),
    Script {
        #[serde(default)]
        bash: Option<String>,
        #[serde(default)]
        zsh: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnv {
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Object {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        sh: Option<String>,
    },
}

impl TryFrom<RawAlias> for AliasSpec {
    type Error = String;

    fn try_from(raw: RawAlias) -> Result<Self, Self::Error> {
        let spec = match raw {
            RawAlias::Command(command) => AliasSpec::new(command),
            RawAlias::Detailed {
                command,
                completion,
                when,
                fallback,
            } => {
                let completion = match completion {
                    None | Some(RawCompletion::Toggle(true)) => None,
                    Some(RawCompletion::Toggle(false)) => Some(Completion::Disabled),
                    Some(RawCompletion::Inherit(cmd)) if cmd.trim().is_empty() => None,
                    Some(RawCompletion::Inherit(cmd)) => Some(Completion::Inherit(cmd)),
                    Some(RawCompletion::Script { bash, zsh }) => {
                        if bash.is_none() && zsh.is_none() {
                            return Err("completion object needs 'bash' or 'zsh'".to_string());
                        }
                        Some(Completion::Script { bash, zsh })
                    }
                };
                AliasSpec {
                    command,
                    completion,
                    when,
                    fallback,
                }
            }
        };

        if spec.command.trim().is_empty() {
            return Err("alias command must not be empty".to_string());
        }
        if spec.fallback.is_some() && spec.when.is_none() {
            return Err("'else' requires a 'when' condition".to_string());
        }
        Ok(spec)
    }
}

impl TryFrom<RawEnv> for EnvSpec {
    type Error = String;

    fn try_from(raw: RawEnv) -> Result<Self, Self::Error> {
        match raw {
            RawEnv::Text(v) => Ok(EnvSpec::Static(v)),
            RawEnv::Bool(v) => Ok(EnvSpec::Static(v.to_string())),
            RawEnv::Int(v) => Ok(EnvSpec::Static(v.to_string())),
            RawEnv::Float(v) => Ok(EnvSpec::Static(v.to_string())),
            RawEnv::Object {
                value: Some(_),
                sh: Some(_),
            } => Err("env entry cannot have both 'value' and 'sh'".to_string()),
            RawEnv::Object {
                value: Some(v),
                sh: None,
            } => Ok(EnvSpec::Static(v)),
            RawEnv::Object {
                value: None,
                sh: Some(cmd),
            } => {
                if cmd.trim().is_empty() {
                    Err("'sh' command must not be empty".to_string())
                } else {
                    Ok(EnvSpec::Shell(cmd))
                }
            }
            RawEnv::Object {
                value: None,
                sh: None,
            } => Err("env entry needs 'value' or 'sh'".to_string()),
        }
    }
}

/// Names a directory defines, used to unset them when it is left
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedNames {
    pub aliases: Vec<String>,
    pub functions: Vec<String>,
    pub env: Vec<String>,
}

impl DefinedNames {
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty() && self.functions.is_empty() && self.env.is_empty()
    }

    /// Append names not already present, keeping first-seen order
    pub fn extend(&mut self, other: DefinedNames) {
        push_unique(&mut self.aliases, other.aliases);
        push_unique(&mut self.functions, other.functions);
        push_unique(&mut self.env, other.env);
    }
}

fn push_unique(into: &mut Vec<String>, from: Vec<String>) {
    for name in from {
        if !into.contains(&name) {
            into.push(name);
        }
    }
}

impl ConfigDocument {
    /// Check that every defined name can be emitted as shell code
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.aliases.keys().chain(self.functions.keys()) {
            if !COMMAND_NAME.is_match(name) {
                return Err(ConfigError::InvalidAlias {
                    name: name.clone(),
                    reason: "name contains characters the shell cannot define".to_string(),
                });
            }
        }
        for name in self.env.keys() {
            if !ENV_NAME.is_match(name) {
                return Err(ConfigError::InvalidEnv {
                    name: name.clone(),
                    reason: "must match [A-Za-z_][A-Za-z0-9_]*".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn names(&self) -> DefinedNames {
        DefinedNames {
            aliases: self.aliases.keys().cloned().collect(),
            functions: self.functions.keys().cloned().collect(),
            env: self.env.keys().cloned().collect(),
        }
    }

    /// Alias and function name -> command; function bodies carry [`FUNCTION_PREFIX`]
    pub fn command_map(&self) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = self
            .aliases
            .iter()
            .map(|(name, spec)| (name.clone(), spec.command.clone()))
            .collect();
        for (name, body) in &self.functions {
            map.insert(name.clone(), format!("{}{}", FUNCTION_PREFIX, body));
        }
        map
    }

    /// Alias name -> command used only for completion
    pub fn completion_map(&self) -> BTreeMap<String, String> {
        self.aliases
            .iter()
            .filter_map(|(name, spec)| match &spec.completion {
                Some(Completion::Inherit(cmd)) => Some((name.clone(), cmd.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn static_env(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .filter_map(|(name, spec)| match spec {
                EnvSpec::Static(v) => Some((name.clone(), v.clone())),
                EnvSpec::Shell(_) => None,
            })
            .collect()
    }

    /// `Shell` env variables: name -> command
    pub fn shell_commands(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .filter_map(|(name, spec)| match spec {
                EnvSpec::Shell(cmd) => Some((name.clone(), cmd.clone())),
                EnvSpec::Static(_) => None,
            })
            .collect()
    }
}
