use std::{collections::BTreeSet, fmt, sync::Arc};

use autopilot_protocol::{CheckResult, Evaluation};

use crate::{params::Params, store, CheckError, Param, ProviderError};

pub type CommandFn = Arc<dyn Fn(&mut CommandContext) -> Result<(), CheckError> + Send + Sync>;
pub type EvaluatorFn = Arc<dyn Fn(&[CheckResult]) -> Result<Evaluation, CheckError> + Send + Sync>;
pub type VersionFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Hidden argument that collects the rest of the command line after a sub-command.
pub(crate) const CHAIN_ARG: &str = "autopilot_chain";

/// Options reserved by the app builder.
pub(crate) const RESERVED_PARAMS: &[&str] = &[
    "help",
    "version",
    "no_colors",
    "no-colors",
    "debug",
    CHAIN_ARG,
    "autopilot-chain",
];

/// What a command body sees while it runs.
#[derive(Debug, Clone)]
pub struct CommandContext {
    command: String,
    params: Params,
    group_params: Params,
}

impl CommandContext {
    pub(crate) fn new(command: impl Into<String>, params: Params, group_params: Params) -> Self {
        Self {
            command: command.into(),
            params,
            group_params,
        }
    }

    /// Name of the command (or sub-command) being run.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Values of the parameters declared on the enclosing group, empty for single commands.
    pub fn group_params(&self) -> &Params {
        &self.group_params
    }

    pub fn add_result(&self, result: CheckResult) {
        store::append(result);
    }

    pub fn set_output(&self, key: impl Into<String>, value: impl Into<String>) {
        store::set_output(key, value);
    }
}

/// A sub-command of a command group.
#[derive(Clone)]
pub struct SubcommandProvider {
    pub(crate) name: String,
    pub(crate) help: Option<String>,
    pub(crate) params: Vec<Param>,
    pub(crate) body: CommandFn,
    pub(crate) evaluator: Option<EvaluatorFn>,
}

impl SubcommandProvider {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&mut CommandContext) -> Result<(), CheckError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            help: None,
            params: Vec::new(),
            body: Arc::new(body),
            evaluator: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Evaluator run over the results this sub-command produced, right after it ran.
    pub fn evaluator<F>(mut self, evaluator: F) -> Self
    where
        F: Fn(&[CheckResult]) -> Result<Evaluation, CheckError> + Send + Sync + 'static,
    {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

}

impl fmt::Debug for SubcommandProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubcommandProvider")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("evaluator", &self.evaluator.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub enum ProviderKind {
    Command(CommandFn),
    Group(Vec<SubcommandProvider>),
}

/// Declarative description of an autopilot CLI.
#[derive(Clone)]
pub struct Provider {
    pub(crate) name: String,
    pub(crate) help: Option<String>,
    pub(crate) params: Vec<Param>,
    pub(crate) kind: ProviderKind,
    pub(crate) evaluator: Option<EvaluatorFn>,
    pub(crate) version: Option<VersionFn>,
}

impl Provider {
    /// A single-command autopilot.
    pub fn command(
        name: impl Into<String>,
        body: impl Fn(&mut CommandContext) -> Result<(), CheckError> + Send + Sync + 'static,
    ) -> Self {
        Self::with_kind(name, ProviderKind::Command(Arc::new(body)))
    }

    /// A command group. Sub-commands may be chained on one command line only when the group
    /// declares an [`evaluator`](Provider::evaluator).
    pub fn group(
        name: impl Into<String>,
        subcommands: impl IntoIterator<Item = SubcommandProvider>,
    ) -> Self {
        Self::with_kind(name, ProviderKind::Group(subcommands.into_iter().collect()))
    }

    fn with_kind(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            help: None,
            params: Vec::new(),
            kind,
            evaluator: None,
            version: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn evaluator<F>(mut self, evaluator: F) -> Self
    where
        F: Fn(&[CheckResult]) -> Result<Evaluation, CheckError> + Send + Sync + 'static,
    {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn version(mut self, version: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.version = Some(Arc::new(version));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    pub fn subcommands(&self) -> &[SubcommandProvider] {
        match &self.kind {
            ProviderKind::Command(_) => &[],
            ProviderKind::Group(subcommands) => subcommands,
        }
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Chaining is tied to the top-level evaluator: without one there is nothing to combine the
    /// chained verdicts with.
    pub fn allows_chaining(&self) -> bool {
        matches!(self.kind, ProviderKind::Group(_)) && self.has_evaluator()
    }

    pub(crate) fn find_subcommand(&self, name: &str) -> Option<&SubcommandProvider> {
        self.subcommands().iter().find(|sub| sub.name == name)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        check_name(&self.name)?;
        check_params(&self.name, &self.params)?;

        if let ProviderKind::Group(subcommands) = &self.kind {
            if subcommands.is_empty() {
                return Err(ProviderError::NoSubcommands {
                    provider: self.name.clone(),
                });
            }
            let mut seen = BTreeSet::new();
            for sub in subcommands {
                check_name(&sub.name)?;
                if !seen.insert(sub.name.as_str()) {
                    return Err(ProviderError::DuplicateSubcommand {
                        name: sub.name.clone(),
                    });
                }
                check_params(&sub.name, &sub.params)?;
            }
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<(), ProviderError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ProviderError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn check_params(command: &str, params: &[Param]) -> Result<(), ProviderError> {
    let mut seen = BTreeSet::new();
    for param in params {
        check_name(&param.name)?;
        if RESERVED_PARAMS.contains(&param.name.as_str())
            || RESERVED_PARAMS.contains(&param.long_name().as_str())
        {
            return Err(ProviderError::ReservedParam {
                command: command.to_string(),
                name: param.name.clone(),
            });
        }
        if !seen.insert(param.long_name()) {
            return Err(ProviderError::DuplicateParam {
                command: command.to_string(),
                name: param.name.clone(),
            });
        }
    }
    Ok(())
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ProviderKind::Command(_) => "command".to_string(),
            ProviderKind::Group(subs) => format!(
                "group[{}]",
                subs.iter()
                    .map(|sub| sub.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("params", &self.params)
            .field("evaluator", &self.evaluator.is_some())
            .field("version", &self.version.is_some())
            .finish()
    }
}
