//! Small autopilots used by the end-to-end tests and as usage samples.
//!
//! - `hello-autopilot`: a single command with flags, an env-backed option and a config file.
//! - `multi-autopilot`: a command group without a top-level evaluator (no chaining).
//! - `chained-autopilot`: a chainable group with sub-command and top-level evaluators.

use std::io;

use autopilot::{
    config::load_config_file,
    evaluator::{default_evaluator, metadata_status_evaluator},
    App, CheckError, CheckResult, CommandContext, Param, Provider, ProviderError,
    SubcommandProvider, Validator,
};
use serde::Deserialize;
use tracing::{debug, info};

/// Optional `--config` file of `hello-autopilot` (JSON or TOML).
#[derive(Debug, Clone, Deserialize)]
pub struct HelloConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Names longer than this leave the greeting unfulfilled.
    #[serde(default)]
    pub max_name_length: Option<usize>,
}

fn default_greeting() -> String {
    "Hello".to_string()
}

fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn hello(ctx: &mut CommandContext) -> Result<(), CheckError> {
    let params = ctx.params();
    if params.flag("fail") {
        return Err(CheckError::unexpected(io::Error::other(
            "simulated crash requested with --fail",
        )));
    }

    let config = match params.get("config") {
        Some(path) => load_config_file::<HelloConfig>(path)?,
        None => HelloConfig {
            greeting: default_greeting(),
            max_name_length: None,
        },
    };
    let name = params.require("name")?.to_string();
    let red = params.flag("red");
    let outputs: Vec<String> = params.get_all("output").into_iter().map(String::from).collect();

    info!("{}, {name}!", config.greeting);
    for pair in outputs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            CheckError::input_validation("output", format!("`{pair}` is not KEY=VALUE"))
        })?;
        ctx.set_output(key, value);
    }
    ctx.set_output("greeting", format!("{}, {name}!", config.greeting));

    let mut result = CheckResult::new(
        "greeting delivered",
        !red,
        if red {
            "--red was given".to_string()
        } else {
            format!("greeted {name}")
        },
    );
    if let Some(max) = config.max_name_length {
        if name.chars().count() > max {
            debug!(max, "name longer than configured");
            result = CheckResult::unfulfilled(
                "greeting delivered",
                format!("name is longer than {max} characters"),
            );
        }
    }
    ctx.add_result(result);
    Ok(())
}

pub fn hello_provider() -> Provider {
    Provider::command("hello-autopilot", hello)
        .help("Greets someone and reports whether the greeting went through")
        .param(
            Param::option("name")
                .help("Who to greet")
                .env("HELLO_NAME")
                .default_value("world")
                .min_length(3),
        )
        .param(Param::flag("red").help("Report the greeting as not fulfilled"))
        .param(Param::flag("fail").help("Crash with an unexpected error"))
        .param(
            Param::option("output")
                .help("Extra output as KEY=VALUE")
                .multiple(true)
                .validate(Validator::custom(|value| {
                    if value.contains('=') {
                        Ok(())
                    } else {
                        Err(format!("`{value}` is not KEY=VALUE"))
                    }
                })),
        )
        .param(Param::option("config").help("JSON or TOML file with greeting settings"))
        .version(version)
}

pub fn hello_app() -> Result<App, ProviderError> {
    App::new(hello_provider())
}

fn check_target(label: &'static str) -> SubcommandProvider {
    SubcommandProvider::new(label, move |ctx| {
        let target = ctx.params().require("target")?.to_string();
        let reachable = !target.starts_with('!');
        ctx.add_result(CheckResult::new(
            format!("{label} target reachable"),
            reachable,
            format!("checked {target}"),
        ));
        Ok(())
    })
    .help("Checks one target; a leading `!` marks it unreachable")
    .param(Param::positional("target").required(true))
}

pub fn multi_provider() -> Provider {
    Provider::group("multi-autopilot", [check_target("check_a"), check_target("check_b")])
        .help("Two independent checks; exactly one runs per invocation")
        .version(version)
}

pub fn multi_app() -> Result<App, ProviderError> {
    App::new(multi_provider())
}

pub fn chained_provider() -> Provider {
    let check_a = SubcommandProvider::new("check_a", |ctx| {
        ctx.set_output("k", "v1");
        Ok(())
    })
    .help("Prepares the shared output");

    let check_b = SubcommandProvider::new("check_b", |ctx| {
        ctx.set_output("k", "v2");
        let strict = ctx.group_params().flag("strict");
        ctx.add_result(
            CheckResult::new("output refreshed", true, "k now holds v2")
                .with_metadata("strict", strict),
        );
        Ok(())
    })
    .help("Refreshes the shared output and checks it")
    .evaluator(|results| Ok(default_evaluator(results)));

    Provider::group("chained-autopilot", [check_a, check_b])
        .help("Chainable checks: `chained-autopilot check_a check_b`")
        .param(Param::flag("strict").help("Record strict mode in result metadata"))
        .evaluator(metadata_status_evaluator)
        .version(version)
}

pub fn chained_app() -> Result<App, ProviderError> {
    App::new(chained_provider())
}
