use autopilot::{
    testing::{assert_no_result_status, assert_result_status, run_app, status_lines},
    App, CheckError, CheckResult, CommandContext, Evaluation, OutputMap, Param, Provider, Status,
    SubcommandProvider, Validator,
};
use autopilot_protocol::ProtocolLine;

fn hello() -> App {
    let provider = Provider::command("hello", |ctx| {
        if ctx.params().flag("fail") {
            panic!("boom");
        }
        let red = ctx.params().flag("red");
        let name = ctx.params().get("name").unwrap_or("world").to_string();
        ctx.set_output("greeted", name.clone());
        ctx.add_result(CheckResult::new(
            "greeting works",
            !red,
            format!("said hello to {name}"),
        ));
        Ok(())
    })
    .help("Says hello")
    .param(Param::flag("red"))
    .param(Param::flag("fail"))
    .param(Param::option("name").env("HELLO_TEST_NAME").min_length(3))
    .version(|| "hello 1.2.3".to_string());
    App::new(provider).unwrap()
}

fn target_sub(name: &'static str) -> SubcommandProvider {
    SubcommandProvider::new(name, move |ctx| {
        let target = ctx.params().require("target")?.to_string();
        ctx.add_result(CheckResult::fulfilled(
            format!("{name} checked"),
            format!("target {target}"),
        ));
        Ok(())
    })
    .param(Param::positional("target").required(true))
}

fn set_k(
    value: &'static str,
) -> impl Fn(&mut CommandContext) -> Result<(), CheckError> + Send + Sync + 'static {
    move |ctx| {
        ctx.set_output("k", value);
        Ok(())
    }
}

fn protocol_kinds(stdout: &str) -> Vec<&'static str> {
    stdout
        .lines()
        .map(ProtocolLine::parse)
        .filter_map(|line| match line {
            ProtocolLine::Result(_) => Some("result"),
            ProtocolLine::Output(_) => Some("output"),
            ProtocolLine::Status(_) => Some("status"),
            ProtocolLine::Log(_) => None,
        })
        .collect()
}

#[test]
fn single_command_success_is_green() {
    let run = run_app(&hello(), Vec::<String>::new());
    assert_eq!(run.code, 0);
    assert_result_status(&run.stdout, Status::Green, Some("^All criteria are fulfilled\\.$"));
    assert!(run
        .stdout
        .contains(r#"{"status":"GREEN","reason":"All criteria are fulfilled."}"#));
    assert_eq!(protocol_kinds(&run.stdout), ["output", "result", "status"]);

    let result = run
        .lines()
        .find_map(|line| match line {
            ProtocolLine::Result(result) => Some(result),
            _ => None,
        })
        .expect("result line");
    assert!(result.fulfilled);
    assert_eq!(result.justification, "said hello to world");
}

#[test]
fn unfulfilled_result_is_red() {
    let run = run_app(&hello(), ["--red"]);
    assert_eq!(run.code, 0);
    let last = run.stdout.lines().last().unwrap();
    assert_eq!(
        last,
        r#"{"status":"RED","reason":"Not all criteria are fulfilled!"}"#
    );
}

#[test]
fn panicking_body_crashes_without_status() {
    let run = run_app(&hello(), ["--fail"]);
    assert_ne!(run.code, 0);
    assert_no_result_status(&run.stdout);
    assert!(run.stdout.contains("Error: panicked: boom"), "{}", run.stdout);
}

#[test]
fn invalid_option_value_fails_before_running() {
    let run = run_app(&hello(), ["--name", "ab"]);
    assert_eq!(run.code, 0);
    assert_result_status(
        &run.stdout,
        Status::Failed,
        Some("^Input validation failed for name: value must be at least 3"),
    );
    assert_eq!(protocol_kinds(&run.stdout), ["status"]);
}

#[test]
fn unknown_option_is_a_failed_usage() {
    let run = run_app(&hello(), ["--bogus"]);
    assert_eq!(run.code, 0);
    assert_result_status(&run.stdout, Status::Failed, Some("--bogus"));
}

#[test]
fn help_and_version_exit_cleanly() {
    let help = run_app(&hello(), ["--help"]);
    assert_eq!(help.code, 0);
    assert!(help.stdout.contains("Says hello"));
    assert!(help.stdout.contains("--no-colors"));
    assert!(help.stdout.contains("--debug"));
    assert_no_result_status(&help.stdout);

    let version = run_app(&hello(), ["--version"]);
    assert_eq!(version.code, 0);
    assert_eq!(version.stdout, "hello 1.2.3\n");
}

#[test]
fn version_flag_only_exists_with_a_callback() {
    let app = App::new(Provider::command("plain", |_| Ok(()))).unwrap();
    let run = run_app(&app, ["--version"]);
    assert_result_status(&run.stdout, Status::Failed, Some("--version"));
}

#[test]
fn no_results_and_no_evaluator_means_no_status() {
    let app = App::new(Provider::command("quiet", |ctx| {
        ctx.set_output("only", "outputs");
        Ok(())
    }))
    .unwrap();
    let run = run_app(&app, Vec::<String>::new());
    assert_eq!(run.code, 0);
    assert_no_result_status(&run.stdout);
    assert_eq!(protocol_kinds(&run.stdout), ["output"]);
}

#[test]
fn configuration_error_is_failed() {
    let app = App::new(Provider::command("configured", |ctx| {
        ctx.add_result(CheckResult::fulfilled("partial", "before the error"));
        Err(CheckError::configuration("rules file is missing"))
    }))
    .unwrap();
    let run = run_app(&app, Vec::<String>::new());
    assert_eq!(run.code, 0);
    assert_eq!(protocol_kinds(&run.stdout), ["result", "status"]);
    assert_result_status(&run.stdout, Status::Failed, Some("^rules file is missing$"));
}

#[test]
fn unexpected_error_prints_cause_chain() {
    let app = App::new(Provider::command("io", |_| {
        let err = std::fs::read_to_string("/definitely/not/here/autopilot.json").unwrap_err();
        Err(CheckError::from(err))
    }))
    .unwrap();
    let run = run_app(&app, Vec::<String>::new());
    assert_eq!(run.code, 1);
    assert_no_result_status(&run.stdout);
    assert!(run.stdout.starts_with("Error: "), "{}", run.stdout);
}

#[test]
fn extra_arguments_without_chaining_fail() {
    let app = App::new(Provider::group(
        "multi",
        [target_sub("check_a"), target_sub("check_b")],
    ))
    .unwrap();
    let run = run_app(&app, ["check_a", "x", "check_b", "y"]);
    assert_eq!(run.code, 0);
    assert_eq!(
        run.stdout.trim_end(),
        r#"{"status":"FAILED","reason":"Got unexpected extra arguments (check_b y)"}"#
    );
}

#[test]
fn group_without_subcommand_fails() {
    let app = App::new(Provider::group("multi", [target_sub("check_a")])).unwrap();
    let run = run_app(&app, Vec::<String>::new());
    assert_result_status(&run.stdout, Status::Failed, Some("^Missing command\\.$"));
}

#[test]
fn single_subcommand_uses_default_evaluator() {
    let app = App::new(Provider::group(
        "multi",
        [target_sub("check_a"), target_sub("check_b")],
    ))
    .unwrap();
    let run = run_app(&app, ["check_b", "y"]);
    assert_eq!(run.code, 0);
    assert_eq!(protocol_kinds(&run.stdout), ["result", "status"]);
    assert_result_status(&run.stdout, Status::Green, None);
}

#[test]
fn chained_evaluators_emit_in_order_and_the_last_wins() {
    let provider = Provider::group(
        "chained",
        [
            target_sub("check_a").evaluator(|results| {
                Ok(Evaluation::new(Status::Yellow, format!("a saw {}", results.len())))
            }),
            target_sub("check_b").evaluator(|results| {
                Ok(Evaluation::new(Status::Green, format!("b saw {}", results.len())))
            }),
        ],
    )
    .evaluator(|results| {
        Ok(Evaluation::new(
            Status::Red,
            format!("overall {}", results.len()),
        ))
    });
    let run = run_app(&App::new(provider).unwrap(), ["check_a", "x", "check_b", "y"]);
    assert_eq!(run.code, 0);
    assert_eq!(
        protocol_kinds(&run.stdout),
        ["result", "status", "result", "status", "status"]
    );

    let statuses = status_lines(&run.stdout);
    assert_eq!(
        statuses,
        vec![
            Evaluation::new(Status::Yellow, "a saw 1"),
            Evaluation::new(Status::Green, "b saw 1"),
            Evaluation::new(Status::Red, "overall 2"),
        ]
    );
    assert_result_status(&run.stdout, Status::Red, Some("^overall 2$"));
}

#[test]
fn failing_subcommand_evaluator_ends_the_chain_with_failed() {
    let provider = Provider::group(
        "chained",
        [
            SubcommandProvider::new("a", |ctx| {
                ctx.add_result(CheckResult::fulfilled("a ran", ""));
                Ok(())
            })
            .evaluator(|_| Err(CheckError::configuration("thresholds missing"))),
            SubcommandProvider::new("b", |ctx| {
                ctx.add_result(CheckResult::fulfilled("b ran", ""));
                Ok(())
            }),
        ],
    )
    .evaluator(|_| Ok(Evaluation::new(Status::Green, "all good")));
    let run = run_app(&App::new(provider).unwrap(), ["a", "b"]);

    assert_eq!(run.code, 0);
    assert_eq!(protocol_kinds(&run.stdout), ["result", "status"]);
    assert_eq!(
        status_lines(&run.stdout),
        vec![Evaluation::new(Status::Failed, "thresholds missing")]
    );
    assert!(!run.stdout.contains("b ran"), "{}", run.stdout);
    assert_result_status(&run.stdout, Status::Failed, Some("^thresholds missing$"));
}

#[test]
fn chained_params_are_validated_before_anything_runs() {
    let provider = Provider::group(
        "chained",
        [
            target_sub("check_a"),
            target_sub("check_b")
                .param(Param::option("level").validate(Validator::one_of(["low", "high"]))),
        ],
    )
    .evaluator(|_| Ok(Evaluation::new(Status::Green, "ok")));
    let run = run_app(
        &App::new(provider).unwrap(),
        ["check_a", "x", "check_b", "y", "--level", "max"],
    );
    assert_eq!(protocol_kinds(&run.stdout), ["status"]);
    assert_result_status(&run.stdout, Status::Failed, Some("^Input validation failed for level"));
}

#[test]
fn outputs_are_emitted_per_body_and_last_value_wins() {
    let provider = Provider::group(
        "outputs",
        [
            SubcommandProvider::new("first", set_k("v1")),
            SubcommandProvider::new("second", set_k("v2")),
        ],
    )
    .evaluator(|_| Ok(Evaluation::new(Status::Green, "ok")));
    let run = run_app(&App::new(provider).unwrap(), ["first", "second"]);

    let parsed = autopilot_protocol::parse_stream_str(&run.stdout);
    let expected: OutputMap = [("k".to_string(), "v2".to_string())].into_iter().collect();
    assert_eq!(parsed.outputs, expected);
    assert_eq!(protocol_kinds(&run.stdout), ["output", "output", "status"]);
}

#[test]
fn group_params_reach_subcommands() {
    let provider = Provider::group(
        "grouped",
        [SubcommandProvider::new("check", |ctx| {
            let rules = ctx.group_params().get("rules").unwrap_or("none").to_string();
            ctx.add_result(CheckResult::fulfilled("rules loaded", rules));
            Ok(())
        })],
    )
    .param(Param::option("rules").default_value("default.toml"));
    let run = run_app(&App::new(provider).unwrap(), ["--rules", "strict.toml", "check"]);
    let result = run
        .lines()
        .find_map(|line| match line {
            ProtocolLine::Result(result) => Some(result),
            _ => None,
        })
        .expect("result line");
    assert_eq!(result.justification, "strict.toml");
}

#[test]
fn malformed_providers_are_rejected() {
    let err = App::new(Provider::command("c", |_| Ok(())).param(Param::flag("help"))).unwrap_err();
    assert!(err.to_string().contains("built-in option"));
}
