use std::{
    error::Error as StdError,
    ffi::OsString,
    fmt::Write as _,
    io::{self, Write},
};

use autopilot_protocol::Evaluation;
use clap::{error::ErrorKind, value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, error, warn};

use crate::{
    emit::Emitter,
    evaluator::{catch_panic, default_evaluator, run_evaluator},
    logging::{self, LogOptions},
    params::{self, Params},
    provider::CHAIN_ARG,
    store, CheckError, CommandContext, CommandFn, Param, ParamKind, Provider, ProviderError,
    ProviderKind, SubcommandProvider,
};

const VERSION_ARG: &str = "version";
const NO_COLORS_ARG: &str = "no_colors";
const DEBUG_ARG: &str = "debug";

/// Executable form of a [`Provider`].
#[derive(Debug, Clone)]
pub struct App {
    provider: Provider,
}

/// Why execution stopped before (or instead of) evaluating.
enum Halt {
    /// `--help` / `--version`: print and exit 0.
    Display(String),
    Error(CheckError),
}

impl From<CheckError> for Halt {
    fn from(err: CheckError) -> Self {
        Halt::Error(err)
    }
}

struct Invocation<'p> {
    sub: &'p SubcommandProvider,
    params: Params,
}

#[derive(Debug, Clone, Copy, Default)]
struct GlobalOptions {
    debug: bool,
    no_colors: bool,
}

impl GlobalOptions {
    fn absorb(&mut self, matches: &ArgMatches) {
        self.debug |= flag_set(matches, DEBUG_ARG);
        self.no_colors |= flag_set(matches, NO_COLORS_ARG);
    }

    fn log_options(&self) -> LogOptions {
        LogOptions {
            debug: self.debug,
            colors: !self.no_colors,
        }
    }
}

impl App {
    pub fn new(provider: Provider) -> Result<Self, ProviderError> {
        provider.validate()?;
        Ok(Self { provider })
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// The full `clap` command tree, including the injected options.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(self.provider.name.clone())
            .disable_version_flag(true)
            .args(global_args())
            .args(self.provider.params.iter().map(Param::to_arg));
        if let Some(help) = &self.provider.help {
            cmd = cmd.about(help.clone());
        }
        if self.provider.version.is_some() {
            cmd = cmd.arg(
                Arg::new(VERSION_ARG)
                    .long("version")
                    .action(ArgAction::SetTrue)
                    .exclusive(true)
                    .help("Show the version and exit"),
            );
        }
        if let ProviderKind::Group(subcommands) = &self.provider.kind {
            cmd = cmd
                .disable_help_subcommand(true)
                .subcommand_value_name("COMMAND")
                .subcommands(subcommands.iter().map(subcommand));
        }
        cmd
    }

    /// Parser for the tail of a chained command line (`... check_a x check_b y`).
    fn chain_command(&self) -> Command {
        Command::new(self.provider.name.clone())
            .no_binary_name(true)
            .disable_version_flag(true)
            .disable_help_subcommand(true)
            .subcommand_required(true)
            .args(global_args())
            .subcommands(self.provider.subcommands().iter().map(subcommand))
    }

    /// Runs with the process arguments and exits with the resulting return code.
    pub fn main(&self) -> ! {
        std::process::exit(self.run())
    }

    pub fn run(&self) -> i32 {
        self.run_from(std::env::args_os(), &mut io::stdout())
    }

    /// Runs one invocation. `args` includes the binary name. Returns the process return code:
    /// 0 whenever the step ran (whatever the verdict), 1 after an unexpected failure.
    pub fn run_from<I, T>(&self, args: I, out: &mut dyn Write) -> i32
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        store::clear();
        let mut emitter = Emitter::new(out);
        match self.execute(args, &mut emitter) {
            Ok(()) => {
                debug!(status_lines = emitter.status_lines(), "step finished");
                0
            }
            Err(Halt::Display(text)) => match emitter.text(&text) {
                Ok(()) => 0,
                Err(err) => {
                    error!(error = %err, "failed to write to stdout");
                    1
                }
            },
            Err(Halt::Error(err)) => self.fail(err, &mut emitter),
        }
    }

    fn fail(&self, err: CheckError, emitter: &mut Emitter<'_>) -> i32 {
        match err.status() {
            Some(status) => {
                warn!(error = %err, "step could not be evaluated");
                match emitter.status(&Evaluation::new(status, err.to_string())) {
                    Ok(()) => 0,
                    Err(write_err) => {
                        error!(error = %write_err, "failed to write status line");
                        1
                    }
                }
            }
            None => {
                error!(error = %err, autopilot = %self.provider.name, "unexpected failure");
                if let Err(write_err) = emitter.text(&error_report(&err)) {
                    error!(error = %write_err, "failed to write error report");
                }
                1
            }
        }
    }

    fn execute<I, T>(&self, args: I, emitter: &mut Emitter<'_>) -> Result<(), Halt>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self
            .command()
            .try_get_matches_from(args)
            .map_err(clap_halt)?;

        if let Some(version) = &self.provider.version {
            if flag_set(&matches, VERSION_ARG) {
                return Err(Halt::Display(version()));
            }
        }

        let mut options = GlobalOptions::default();
        options.absorb(&matches);
        let top_params = params::bind(&self.provider.params, &matches)?;

        match &self.provider.kind {
            ProviderKind::Command(body) => {
                logging::init(options.log_options());
                let ctx = CommandContext::new(
                    self.provider.name.clone(),
                    top_params,
                    Params::default(),
                );
                self.run_body(body, ctx, emitter)?;
                self.evaluate(false, emitter)?;
            }
            ProviderKind::Group(_) => {
                let invocations = self.collect_invocations(&matches, &mut options)?;
                logging::init(options.log_options());

                let mut sub_evaluated = false;
                for invocation in invocations {
                    let start = store::len();
                    let ctx = CommandContext::new(
                        invocation.sub.name.clone(),
                        invocation.params,
                        top_params.clone(),
                    );
                    self.run_body(&invocation.sub.body, ctx, emitter)?;

                    if let Some(evaluator) = &invocation.sub.evaluator {
                        let evaluation = run_evaluator(evaluator, &store::results_since(start))?;
                        debug!(
                            command = %invocation.sub.name,
                            status = %evaluation.status,
                            "sub-command evaluated"
                        );
                        emitter.status(&evaluation)?;
                        sub_evaluated = true;
                    }
                }
                self.evaluate(sub_evaluated, emitter)?;
            }
        }
        Ok(())
    }

    /// Top-level evaluator, or the default one when nothing else produced a verdict.
    fn evaluate(&self, sub_evaluated: bool, emitter: &mut Emitter<'_>) -> Result<(), CheckError> {
        let results = store::results();
        if let Some(evaluator) = &self.provider.evaluator {
            let evaluation = run_evaluator(evaluator, &results)?;
            emitter.status(&evaluation)?;
        } else if !sub_evaluated && !results.is_empty() {
            emitter.status(&default_evaluator(&results))?;
        }
        Ok(())
    }

    /// Resolves every sub-command named on the command line and binds its parameters, before
    /// any body runs.
    fn collect_invocations(
        &self,
        matches: &ArgMatches,
        options: &mut GlobalOptions,
    ) -> Result<Vec<Invocation<'_>>, Halt> {
        let Some((name, sub_matches)) = matches.subcommand() else {
            return Err(CheckError::Usage("Missing command.".to_string()).into());
        };

        let mut invocations = Vec::new();
        let mut next = Some((name.to_string(), sub_matches.clone()));
        while let Some((name, sub_matches)) = next.take() {
            let sub = self
                .provider
                .find_subcommand(&name)
                .ok_or_else(|| CheckError::Usage(format!("No such command '{name}'.")))?;
            options.absorb(&sub_matches);
            invocations.push(Invocation {
                sub,
                params: params::bind(&sub.params, &sub_matches)?,
            });

            let rest = chained_rest(&sub_matches);
            if rest.is_empty() {
                break;
            }
            if !self.provider.allows_chaining() {
                return Err(CheckError::Usage(format!(
                    "Got unexpected extra arguments ({})",
                    rest.join(" ")
                ))
                .into());
            }

            let chained = self
                .chain_command()
                .try_get_matches_from(rest.iter())
                .map_err(clap_halt)?;
            options.absorb(&chained);
            next = chained
                .subcommand()
                .map(|(name, matches)| (name.to_string(), matches.clone()));
        }
        Ok(invocations)
    }

    /// Runs one body, then emits the outputs it set and the results it appended.
    fn run_body(
        &self,
        body: &CommandFn,
        mut ctx: CommandContext,
        emitter: &mut Emitter<'_>,
    ) -> Result<(), CheckError> {
        let results_before = store::len();
        let outputs_before = store::outputs();
        debug!(command = %ctx.command(), "running check");

        let outcome = catch_panic(|| body(&mut ctx)).and_then(|outcome| outcome);

        emitter.output(&store::outputs().changed_since(&outputs_before))?;
        for result in store::results_since(results_before) {
            emitter.result(&result)?;
        }
        outcome
    }
}

fn global_args() -> [Arg; 2] {
    [
        Arg::new(NO_COLORS_ARG)
            .long("no-colors")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Disable colored log output"),
        Arg::new(DEBUG_ARG)
            .long("debug")
            .action(ArgAction::SetTrue)
            .global(true)
            .help("Enable debug logging"),
    ]
}

fn subcommand(sub: &SubcommandProvider) -> Command {
    let mut cmd = Command::new(sub.name.clone()).args(sub.params.iter().map(Param::to_arg));
    if let Some(help) = &sub.help {
        cmd = cmd.about(help.clone());
    }
    // A variadic positional must stay last, so such sub-commands cannot be followed by another.
    let variadic = sub
        .params
        .iter()
        .any(|param| param.kind() == ParamKind::Positional && param.multiple);
    if !variadic {
        cmd = cmd.arg(
            Arg::new(CHAIN_ARG)
                .num_args(0..)
                .action(ArgAction::Append)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .value_parser(value_parser!(String))
                .hide(true),
        );
    }
    cmd
}

fn flag_set(matches: &ArgMatches, id: &str) -> bool {
    matches!(matches.try_get_one::<bool>(id), Ok(Some(true)))
}

fn chained_rest(matches: &ArgMatches) -> Vec<String> {
    matches
        .try_get_many::<String>(CHAIN_ARG)
        .ok()
        .flatten()
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn clap_halt(err: clap::Error) -> Halt {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            Halt::Display(err.render().to_string())
        }
        _ => Halt::Error(CheckError::Usage(usage_message(&err))),
    }
}

/// First paragraph of clap's rendering, on one line and without the `error:` prefix.
fn usage_message(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let paragraph = rendered
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");
    paragraph
        .strip_prefix("error: ")
        .unwrap_or(&paragraph)
        .to_string()
}

/// Message plus cause chain of an unexpected failure, printed instead of a status line.
fn error_report(err: &CheckError) -> String {
    let mut report = format!("Error: {err}\n");
    let mut source = match err {
        CheckError::Unexpected(inner) => inner.source(),
        other => other.source(),
    };
    if source.is_some() {
        report.push_str("\nCaused by:\n");
    }
    let mut depth = 0usize;
    while let Some(cause) = source {
        let _ = writeln!(report, "    {depth}: {cause}");
        depth += 1;
        source = cause.source();
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CheckResult, Status};

    #[derive(Debug, thiserror::Error)]
    #[error("could not open report")]
    struct Outer(#[source] io::Error);

    #[test]
    fn error_report_walks_the_cause_chain() {
        let err = CheckError::unexpected(Outer(io::Error::new(
            io::ErrorKind::NotFound,
            "report.pdf missing",
        )));
        let report = error_report(&err);
        assert!(report.starts_with("Error: could not open report\n"));
        assert!(report.contains("Caused by:\n    0: report.pdf missing"));
    }

    #[test]
    fn command_tree_passes_clap_debug_asserts() {
        let provider = Provider::group(
            "g",
            [
                SubcommandProvider::new("a", |_| Ok(()))
                    .param(Param::positional("target").required(true)),
                SubcommandProvider::new("b", |_| Ok(()))
                    .param(Param::positional("files").multiple(true)),
            ],
        )
        .param(Param::option("rules").env("G_RULES"))
        .version(|| "1.0.0".into())
        .evaluator(|_| Ok(Evaluation::new(Status::Green, "ok")));
        let app = App::new(provider).unwrap();
        app.command().debug_assert();
        app.chain_command().debug_assert();
    }

    #[test]
    fn chained_tail_is_split_per_subcommand() {
        let provider = Provider::group(
            "g",
            [
                SubcommandProvider::new("a", |ctx| {
                    ctx.add_result(CheckResult::fulfilled(
                        format!("a:{}", ctx.params().get("x").unwrap_or_default()),
                        "",
                    ));
                    Ok(())
                })
                .param(Param::positional("x")),
                SubcommandProvider::new("b", |_| Ok(())).param(Param::flag("strict")),
            ],
        )
        .evaluator(|_| Ok(Evaluation::new(Status::Green, "ok")));
        let app = App::new(provider).unwrap();

        let matches = app
            .command()
            .try_get_matches_from(["g", "a", "1", "b", "--strict", "a", "2"])
            .unwrap();
        let mut options = GlobalOptions::default();
        let invocations = match app.collect_invocations(&matches, &mut options) {
            Ok(invocations) => invocations,
            Err(_) => panic!("chain should parse"),
        };
        let names: Vec<_> = invocations.iter().map(|inv| inv.sub.name()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert_eq!(invocations[0].params.get("x"), Some("1"));
        assert!(invocations[1].params.flag("strict"));
        assert_eq!(invocations[2].params.get("x"), Some("2"));
    }
}
