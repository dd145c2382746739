use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use clap::{builder::BoolishValueParser, value_parser, Arg, ArgAction, ArgMatches};
use regex::Regex;

use crate::CheckError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `--name`, boolean.
    Flag,
    /// `--name VALUE`.
    Option,
    /// Bare value, in declaration order.
    Positional,
}

/// Rule applied to every value of a parameter before the command body runs.
#[derive(Clone)]
pub enum Validator {
    MinLength(usize),
    MaxLength(usize),
    Pattern(Regex),
    OneOf(Vec<String>),
    Custom(Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>),
}

impl Validator {
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Validator::Pattern(Regex::new(pattern)?))
    }

    pub fn one_of(choices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Validator::OneOf(choices.into_iter().map(Into::into).collect())
    }

    pub fn custom(check: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Validator::Custom(Arc::new(check))
    }

    pub fn check(&self, value: &str) -> Result<(), String> {
        match self {
            Validator::MinLength(min) => {
                let len = value.chars().count();
                if len < *min {
                    return Err(format!(
                        "value must be at least {min} characters long (got {len})"
                    ));
                }
            }
            Validator::MaxLength(max) => {
                let len = value.chars().count();
                if len > *max {
                    return Err(format!(
                        "value must be at most {max} characters long (got {len})"
                    ));
                }
            }
            Validator::Pattern(regex) => {
                if !regex.is_match(value) {
                    return Err(format!("value `{value}` does not match `{}`", regex.as_str()));
                }
            }
            Validator::OneOf(choices) => {
                if !choices.iter().any(|choice| choice == value) {
                    return Err(format!(
                        "value `{value}` is not one of: {}",
                        choices.join(", ")
                    ));
                }
            }
            Validator::Custom(check) => check(value)?,
        }
        Ok(())
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::MinLength(n) => f.debug_tuple("MinLength").field(n).finish(),
            Validator::MaxLength(n) => f.debug_tuple("MaxLength").field(n).finish(),
            Validator::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Validator::OneOf(choices) => f.debug_tuple("OneOf").field(choices).finish(),
            Validator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One entry of a command's parameter schema.
#[derive(Debug, Clone)]
pub struct Param {
    pub(crate) name: String,
    pub(crate) kind: ParamKind,
    pub(crate) help: Option<String>,
    pub(crate) short: Option<char>,
    pub(crate) required: bool,
    pub(crate) default: Option<String>,
    pub(crate) env: Option<String>,
    pub(crate) multiple: bool,
    pub(crate) validators: Vec<Validator>,
}

impl Param {
    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            help: None,
            short: None,
            required: false,
            default: None,
            env: None,
            multiple: false,
            validators: Vec::new(),
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Flag)
    }

    pub fn option(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Option)
    }

    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Positional)
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Environment variable consulted when the value is not given on the command line.
    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env = Some(var.into());
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn min_length(self, min: usize) -> Self {
        self.validate(Validator::MinLength(min))
    }

    pub fn max_length(self, max: usize) -> Self {
        self.validate(Validator::MaxLength(max))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Long option spelling: `min_size` becomes `--min-size`.
    pub fn long_name(&self) -> String {
        self.name.replace('_', "-")
    }

    pub(crate) fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name.clone());
        if let Some(help) = &self.help {
            arg = arg.help(help.clone());
        }
        if let Some(env) = &self.env {
            arg = arg.env(env.clone());
        }

        match self.kind {
            ParamKind::Flag => {
                arg = arg.long(self.long_name()).action(ArgAction::SetTrue);
                if self.env.is_some() {
                    arg = arg.value_parser(BoolishValueParser::new());
                }
            }
            ParamKind::Option => {
                arg = arg
                    .long(self.long_name())
                    .value_name(self.name.to_uppercase())
                    .value_parser(value_parser!(String))
                    .required(self.required)
                    .action(if self.multiple {
                        ArgAction::Append
                    } else {
                        ArgAction::Set
                    });
            }
            ParamKind::Positional => {
                arg = arg
                    .value_name(self.name.to_uppercase())
                    .value_parser(value_parser!(String))
                    .required(self.required);
                if self.multiple {
                    arg = arg.num_args(1..).action(ArgAction::Append);
                } else {
                    arg = arg.action(ArgAction::Set);
                }
            }
        }

        if let Some(short) = self.short {
            if self.kind != ParamKind::Positional {
                arg = arg.short(short);
            }
        }
        if let Some(default) = &self.default {
            if self.kind != ParamKind::Flag {
                arg = arg.default_value(default.clone());
            }
        }
        arg
    }

    fn read(&self, matches: &ArgMatches) -> Result<ParamValue, CheckError> {
        if self.kind == ParamKind::Flag {
            let set = matches
                .try_get_one::<bool>(&self.name)
                .map_err(CheckError::unexpected)?
                .copied()
                .unwrap_or(false);
            return Ok(ParamValue::Flag(set));
        }

        let values: Vec<String> = matches
            .try_get_many::<String>(&self.name)
            .map_err(CheckError::unexpected)?
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        for value in &values {
            for validator in &self.validators {
                validator
                    .check(value)
                    .map_err(|message| CheckError::input_validation(&self.name, message))?;
            }
        }

        Ok(match (self.multiple, values.len()) {
            (_, 0) => ParamValue::Absent,
            (false, _) => values
                .into_iter()
                .next()
                .map_or(ParamValue::Absent, ParamValue::Single),
            (true, _) => ParamValue::Many(values),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Flag(bool),
    Single(String),
    Many(Vec<String>),
    Absent,
}

/// Validated parameter values handed to a command body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

impl Params {
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// First value of an option or positional.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            ParamValue::Single(value) => Some(value),
            ParamValue::Many(values) => values.first().map(String::as_str),
            ParamValue::Flag(_) | ParamValue::Absent => None,
        }
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        match self.values.get(name) {
            Some(ParamValue::Single(value)) => vec![value.as_str()],
            Some(ParamValue::Many(values)) => values.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ParamValue::Flag(true)))
    }

    /// Like [`Params::get`] but a missing value is a configuration error.
    pub fn require(&self, name: &str) -> Result<&str, CheckError> {
        self.get(name).ok_or_else(|| {
            CheckError::configuration(format!("Missing required value for `{name}`"))
        })
    }

    /// Parses the value with `FromStr`; a parse failure is an input validation error.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>, CheckError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|err| CheckError::input_validation(name, err.to_string()))
            })
            .transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reads every declared parameter out of `matches` and runs its validators.
pub(crate) fn bind(schema: &[Param], matches: &ArgMatches) -> Result<Params, CheckError> {
    let mut params = Params::default();
    for param in schema {
        params.insert(param.name.clone(), param.read(matches)?);
    }
    Ok(params)
}
