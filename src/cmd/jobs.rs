/*!
`jobs.rs`

The `job` noun: create, kill, and restart operations against a running
scheduler.

Every verb follows the same shape: parse its own options, reach the
scheduler through the execution context, route the response through
`report_outcome`, and only then (for the verbs that wait) start the
lifecycle monitor. A refused response therefore always stops a command
before any polling begins.
*/

use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, value_parser};

use crate::cmd::context::ExecutionContext;
use crate::cmd::dispatch::{CommandError, Noun, Verb, VerbRegistry};
use crate::cmd::shards::ShardSet;
use crate::config::ConfigRequest;
use crate::sched::monitor::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::sched::{JobKey, JobMonitor, job_page_url};

/// Fetch a required positional/option value. The grammar marks these
/// required, so a miss is a framework bug surfaced as a plain error rather
/// than a panic.
fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a String, CommandError> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| CommandError::invalid_parameter(format!("missing required argument '{id}'")))
}

fn jobspec_arg() -> Arg {
    Arg::new("jobspec")
        .value_name("CLUSTER/ROLE/ENV/NAME")
        .required(true)
        .help("Fully-qualified job key")
}

/* --------------------------------- create ---------------------------------- */

/// `job create`: load a config, submit it, optionally wait for the tasks
/// to reach a requested state.
pub struct CreateJobCommand {
    poll_interval: Duration,
    max_attempts: u32,
}

impl Default for CreateJobCommand {
    fn default() -> Self {
        CreateJobCommand {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl CreateJobCommand {
    #[cfg(test)]
    pub fn with_polling(poll_interval: Duration, max_attempts: u32) -> Self {
        CreateJobCommand {
            poll_interval,
            max_attempts,
        }
    }
}

impl Verb for CreateJobCommand {
    fn name(&self) -> &'static str {
        "create"
    }

    fn help(&self) -> &'static str {
        "Create a job from a config file"
    }

    fn options(&self) -> clap::Command {
        clap::Command::new("create")
            .about(self.help())
            .arg(
                Arg::new("bindings")
                    .long("bind")
                    .value_name("NAME=VALUE")
                    .action(ArgAction::Append)
                    .help("Bind a config template variable to a value; repeatable"),
            )
            .arg(
                Arg::new("open_browser")
                    .long("open-browser")
                    .action(ArgAction::SetTrue)
                    .help("Open the job page in a browser after creation"),
            )
            .arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Read the job configuration as JSON"),
            )
            .arg(
                Arg::new("wait_until")
                    .long("wait_until")
                    .value_name("STATE")
                    .value_parser(["PENDING", "RUNNING", "FINISHED"])
                    .default_value("PENDING")
                    .help("Block until every task has reached the given state"),
            )
            .arg(jobspec_arg())
            .arg(
                Arg::new("config_file")
                    .value_name("CONFIG")
                    .required(true)
                    .help("Path to the job config file"),
            )
    }

    fn execute(
        &self,
        context: &mut dyn ExecutionContext,
        matches: &ArgMatches,
    ) -> Result<(), CommandError> {
        let key = JobKey::from_path(required(matches, "jobspec")?)?;
        let request = ConfigRequest {
            path: required(matches, "config_file")?.clone(),
            json: matches.get_flag("json"),
            bindings: matches
                .get_many::<String>("bindings")
                .map(|vals| vals.cloned().collect())
                .unwrap_or_default(),
        };

        let config = context.load_job_config(&key, &request)?;
        let api = context.scheduler_client(&key.cluster)?;
        let response = api.create_job(&config)?;
        context.report_outcome(&response)?;

        if matches.get_flag("open_browser") {
            context.open_in_browser(&job_page_url(api.web_url(), &key));
        }

        let monitor = JobMonitor::new(api, config.key())
            .with_poll_interval(self.poll_interval)
            .with_max_attempts(self.max_attempts);
        match required(matches, "wait_until")?.as_str() {
            "RUNNING" => monitor.wait_until_running_or_finished()?,
            "FINISHED" => monitor.wait_until_terminal()?,
            _ => {}
        }
        Ok(())
    }
}

/* ---------------------------------- kill ----------------------------------- */

/// `job kill`: stop all instances of a job, or a shard subset.
pub struct KillJobCommand;

impl Verb for KillJobCommand {
    fn name(&self) -> &'static str {
        "kill"
    }

    fn help(&self) -> &'static str {
        "Kill instances of a job"
    }

    fn options(&self) -> clap::Command {
        clap::Command::new("kill")
            .about(self.help())
            .arg(
                Arg::new("open_browser")
                    .long("open-browser")
                    .action(ArgAction::SetTrue)
                    .help("Open the job page in a browser after the kill"),
            )
            .arg(
                Arg::new("shards")
                    .long("shards")
                    .value_name("SHARDS")
                    .help(
                        "Instances to act on: a comma-separated list (0,1,2), a range (0-2), \
                         or any combination (0-2,5,7-9). All instances when omitted",
                    ),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_name("CONFIG")
                    .help("Config file for the job; validated against the job key when given"),
            )
            .arg(jobspec_arg())
    }

    fn execute(
        &self,
        context: &mut dyn ExecutionContext,
        matches: &ArgMatches,
    ) -> Result<(), CommandError> {
        let key = JobKey::from_path(required(matches, "jobspec")?)?;
        let shards = ShardSet::parse(matches.get_one::<String>("shards").map(|s| s.as_str()))?;

        if let Some(path) = matches.get_one::<String>("config") {
            let request = ConfigRequest {
                path: path.clone(),
                json: false,
                bindings: Vec::new(),
            };
            context.load_job_config(&key, &request)?;
        }

        let api = context.scheduler_client(&key.cluster)?;
        let response = api.kill_job(&key, shards.as_ref())?;
        context.report_outcome(&response)?;

        if matches.get_flag("open_browser") {
            context.open_in_browser(&job_page_url(api.web_url(), &key));
        }
        Ok(())
    }
}

/* --------------------------------- restart --------------------------------- */

/// `job restart`: restart instances in bounded batches, waiting for each
/// batch to leave the pending state before touching the next one.
pub struct RestartJobCommand {
    poll_interval: Duration,
    max_attempts: u32,
}

impl Default for RestartJobCommand {
    fn default() -> Self {
        RestartJobCommand {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RestartJobCommand {
    #[cfg(test)]
    pub fn with_polling(poll_interval: Duration, max_attempts: u32) -> Self {
        RestartJobCommand {
            poll_interval,
            max_attempts,
        }
    }
}

impl Verb for RestartJobCommand {
    fn name(&self) -> &'static str {
        "restart"
    }

    fn help(&self) -> &'static str {
        "Restart instances of a job"
    }

    fn options(&self) -> clap::Command {
        clap::Command::new("restart")
            .about(self.help())
            .arg(
                Arg::new("shards")
                    .long("shards")
                    .value_name("SHARDS")
                    .help("Instances to restart; all active instances when omitted"),
            )
            .arg(
                Arg::new("batch_size")
                    .long("batch-size")
                    .value_name("N")
                    .value_parser(value_parser!(u32).range(1..))
                    .default_value("1")
                    .help("Number of instances restarted per batch"),
            )
            .arg(
                Arg::new("open_browser")
                    .long("open-browser")
                    .action(ArgAction::SetTrue)
                    .help("Open the job page in a browser afterwards"),
            )
            .arg(jobspec_arg())
            .arg(
                Arg::new("config_file")
                    .value_name("CONFIG")
                    .help("Optional config file; validated against the job key when given"),
            )
    }

    fn execute(
        &self,
        context: &mut dyn ExecutionContext,
        matches: &ArgMatches,
    ) -> Result<(), CommandError> {
        let key = JobKey::from_path(required(matches, "jobspec")?)?;
        let requested = ShardSet::parse(matches.get_one::<String>("shards").map(|s| s.as_str()))?;
        let batch_size = *matches
            .get_one::<u32>("batch_size")
            .unwrap_or(&1) as usize;

        if let Some(path) = matches.get_one::<String>("config_file") {
            let request = ConfigRequest {
                path: path.clone(),
                json: false,
                bindings: Vec::new(),
            };
            context.load_job_config(&key, &request)?;
        }

        let api = context.scheduler_client(&key.cluster)?;

        // One status query up front decides what is actually restartable,
        // so a missing job or a bad shard selection fails before the first
        // restart RPC.
        let statuses = api.tasks_status(&key, None)?;
        let active: ShardSet = statuses.iter().map(|t| t.instance).collect();
        if active.is_empty() {
            return Err(CommandError::command_failure(format!(
                "job {key} has no active instances to restart"
            )));
        }

        let targets = match &requested {
            Some(selection) => {
                if !selection.is_subset(&active) {
                    return Err(CommandError::invalid_parameter(format!(
                        "shards {selection} are not all active instances of {key} (active: {active})"
                    )));
                }
                selection.to_vec()
            }
            None => active.to_vec(),
        };

        for batch in targets.chunks(batch_size) {
            let response = api.restart_shards(&key, batch)?;
            context.report_outcome(&response)?;
            JobMonitor::new(api.clone(), key.clone())
                .with_shards(batch.iter().copied().collect())
                .with_poll_interval(self.poll_interval)
                .with_max_attempts(self.max_attempts)
                .wait_until_running_or_finished()?;
        }

        if matches.get_flag("open_browser") {
            context.open_in_browser(&job_page_url(api.web_url(), &key));
        }
        Ok(())
    }
}

/* ---------------------------------- noun ----------------------------------- */

/// The `job` noun, wiring the three verbs to the default context.
pub struct JobNoun {
    verbs: VerbRegistry,
}

impl JobNoun {
    pub fn new() -> Result<JobNoun, CommandError> {
        let mut verbs = VerbRegistry::new();
        verbs.register(Box::new(CreateJobCommand::default()))?;
        verbs.register(Box::new(KillJobCommand))?;
        verbs.register(Box::new(RestartJobCommand::default()))?;
        Ok(JobNoun { verbs })
    }
}

impl Noun for JobNoun {
    fn name(&self) -> &'static str {
        "job"
    }

    fn help(&self) -> &'static str {
        "Work with scheduler jobs"
    }

    fn verbs(&self) -> &VerbRegistry {
        &self.verbs
    }

    fn create_context(&self) -> Result<Box<dyn ExecutionContext>, CommandError> {
        use crate::cmd::context::SchedulerContext;
        Ok(Box::new(SchedulerContext::from_default_registry()?))
    }
}

/* --------------------------------- Tests ---------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::context::testing::RecordingContext;
    use crate::cmd::dispatch::{
        CommandLine, EXIT_INVALID_CONFIGURATION, EXIT_INVALID_PARAMETER, EXIT_NETWORK_ERROR,
        EXIT_PERMISSION_VIOLATION, EXIT_TIMEOUT, Resolution,
    };
    use crate::sched::types::{ResponseCode, SchedulerResponse, TaskState};

    fn job_command_line() -> CommandLine {
        let mut cli = CommandLine::new("skedctl");
        cli.register_noun(Box::new(JobNoun::new().unwrap())).unwrap();
        cli
    }

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    fn hello_key() -> JobKey {
        JobKey::from_path("west/bozo/test/hello").unwrap()
    }

    fn create_verb() -> CreateJobCommand {
        CreateJobCommand::with_polling(Duration::ZERO, 4)
    }

    fn restart_verb() -> RestartJobCommand {
        RestartJobCommand::with_polling(Duration::ZERO, 4)
    }

    fn matches_for(verb: &dyn Verb, argv: &[&str]) -> ArgMatches {
        verb.options()
            .try_get_matches_from(argv.iter().copied())
            .unwrap()
    }

    /* ---- create ---- */

    #[test]
    fn create_submits_once_and_waits_for_running() {
        let verb = create_verb();
        let matches = matches_for(
            &verb,
            &[
                "create",
                "--wait_until=RUNNING",
                "west/bozo/test/hello",
                "hello.yaml",
            ],
        );
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 2);
        ctx.api.push_status(&[]);
        ctx.api
            .push_status(&[TaskState::Running, TaskState::Running]);

        verb.execute(&mut ctx, &matches).unwrap();

        assert_eq!(ctx.api.create_calls().len(), 1);
        assert_eq!(ctx.api.create_calls()[0].key(), hello_key());
        assert_eq!(ctx.api.status_calls(), 2);
        assert_eq!(ctx.reported.len(), 1);
    }

    #[test]
    fn create_with_delayed_scheduler_polls_until_running() {
        let verb = create_verb();
        let matches = matches_for(
            &verb,
            &[
                "create",
                "--wait_until=RUNNING",
                "west/bozo/test/hello",
                "hello.yaml",
            ],
        );
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 2);
        for states in [
            vec![],
            vec![TaskState::Pending, TaskState::Pending],
            vec![TaskState::Pending, TaskState::Running],
            vec![TaskState::Running, TaskState::Running],
        ] {
            ctx.api.push_status(&states);
        }

        verb.execute(&mut ctx, &matches).unwrap();
        assert_eq!(ctx.api.status_calls(), 4);
    }

    #[test]
    fn create_wait_finished_uses_the_terminal_predicate() {
        let verb = create_verb();
        let matches = matches_for(
            &verb,
            &[
                "create",
                "--wait_until=FINISHED",
                "west/bozo/test/hello",
                "hello.yaml",
            ],
        );
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 2);
        ctx.api
            .push_status(&[TaskState::Running, TaskState::Finished]);
        ctx.api
            .push_status(&[TaskState::Finished, TaskState::Finished]);

        verb.execute(&mut ctx, &matches).unwrap();
        assert_eq!(ctx.api.status_calls(), 2);
    }

    #[test]
    fn create_default_wait_is_pending_and_does_not_poll() {
        let verb = create_verb();
        let matches = matches_for(&verb, &["create", "west/bozo/test/hello", "hello.yaml"]);
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 2);

        verb.execute(&mut ctx, &matches).unwrap();
        assert_eq!(ctx.api.create_calls().len(), 1);
        assert_eq!(ctx.api.status_calls(), 0);
    }

    #[test]
    fn create_refused_by_scheduler_stops_before_polling() {
        let verb = create_verb();
        let matches = matches_for(
            &verb,
            &[
                "create",
                "--wait_until=RUNNING",
                "west/bozo/test/hello",
                "hello.yaml",
            ],
        );
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 2);
        ctx.api.set_create_response(SchedulerResponse::error(
            ResponseCode::Error,
            "quota exceeded",
        ));

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_NETWORK_ERROR);
        assert_eq!(ctx.api.create_calls().len(), 1);
        assert_eq!(ctx.api.status_calls(), 0);
    }

    #[test]
    fn create_permission_denial_maps_to_its_own_exit() {
        let verb = create_verb();
        let matches = matches_for(&verb, &["create", "west/bozo/test/hello", "hello.yaml"]);
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 2);
        ctx.api.set_create_response(SchedulerResponse::error(
            ResponseCode::PermissionDenied,
            "role mismatch",
        ));

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_PERMISSION_VIOLATION);
    }

    #[test]
    fn create_invalid_config_stops_before_any_rpc() {
        let verb = create_verb();
        let matches = matches_for(&verb, &["create", "west/bozo/test/hello", "hello.yaml"]);
        let mut ctx = RecordingContext::new();
        ctx.config_error = Some("syntax error near line 3".into());

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIGURATION);
        assert_eq!(ctx.api.create_calls().len(), 0);
        assert_eq!(ctx.api.status_calls(), 0);
    }

    #[test]
    fn create_times_out_when_tasks_never_start() {
        let verb = create_verb();
        let matches = matches_for(
            &verb,
            &[
                "create",
                "--wait_until=RUNNING",
                "west/bozo/test/hello",
                "hello.yaml",
            ],
        );
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 2);
        for _ in 0..8 {
            ctx.api.push_status(&[TaskState::Pending]);
        }

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_TIMEOUT);
        assert_eq!(ctx.api.status_calls(), 4);
    }

    #[test]
    fn create_bad_job_key_is_an_invalid_parameter() {
        let verb = create_verb();
        let matches = matches_for(&verb, &["create", "west/bozo/test", "hello.yaml"]);
        let mut ctx = RecordingContext::new();

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_PARAMETER);
        assert_eq!(ctx.api.create_calls().len(), 0);
    }

    #[test]
    fn create_passes_bindings_through_to_the_loader() {
        let verb = create_verb();
        let matches = matches_for(
            &verb,
            &[
                "create",
                "--bind",
                "greeting=hi",
                "--bind",
                "count=3",
                "--json",
                "west/bozo/test/hello",
                "hello.json",
            ],
        );
        let mut ctx = RecordingContext::new().with_config_for(&hello_key(), 1);

        verb.execute(&mut ctx, &matches).unwrap();
        let request = &ctx.config_requests[0];
        assert!(request.json);
        assert_eq!(request.path, "hello.json");
        assert_eq!(request.bindings, vec!["greeting=hi", "count=3"]);
    }

    /* ---- kill ---- */

    #[test]
    fn dispatch_resolves_kill_with_expanded_shards() {
        let cli = job_command_line();
        let resolution = cli
            .resolve(&args(&[
                "job",
                "kill",
                "--shards=0,2,4-6",
                "west/bozo/test/hello",
            ]))
            .unwrap();
        let Resolution::Command { verb, matches, .. } = resolution else {
            panic!("expected a resolved command");
        };

        let mut ctx = RecordingContext::new();
        verb.execute(&mut ctx, &matches).unwrap();

        let kills = ctx.api.kill_calls();
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].0, hello_key());
        assert_eq!(kills[0].1, Some(vec![0, 2, 4, 5, 6]));
    }

    #[test]
    fn kill_without_shards_acts_on_all_instances() {
        let verb = KillJobCommand;
        let matches = matches_for(&verb, &["kill", "west/bozo/test/hello"]);
        let mut ctx = RecordingContext::new();

        verb.execute(&mut ctx, &matches).unwrap();
        assert_eq!(ctx.api.kill_calls()[0].1, None);
        assert!(ctx.opened_urls.is_empty());
    }

    #[test]
    fn kill_bad_shard_spec_never_reaches_the_scheduler() {
        let verb = KillJobCommand;
        let matches = matches_for(&verb, &["kill", "--shards=0,x,2", "west/bozo/test/hello"]);
        let mut ctx = RecordingContext::new();

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_PARAMETER);
        assert!(err.message.contains('x'));
        assert!(ctx.api.kill_calls().is_empty());
    }

    #[test]
    fn kill_open_browser_opens_the_job_page() {
        let verb = KillJobCommand;
        let matches = matches_for(&verb, &["kill", "--open-browser", "west/bozo/test/hello"]);
        let mut ctx = RecordingContext::new();

        verb.execute(&mut ctx, &matches).unwrap();
        assert_eq!(ctx.opened_urls.len(), 1);
        assert!(ctx.opened_urls[0].ends_with("/scheduler/bozo/test/hello"));
    }

    #[test]
    fn kill_refused_by_scheduler_is_a_network_error() {
        let verb = KillJobCommand;
        let matches = matches_for(&verb, &["kill", "west/bozo/test/hello"]);
        let mut ctx = RecordingContext::new();
        ctx.api
            .set_kill_response(SchedulerResponse::error(ResponseCode::Error, "not yours"));

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_NETWORK_ERROR);
        assert_eq!(ctx.api.kill_calls().len(), 1);
    }

    #[test]
    fn kill_with_config_validates_it_first() {
        let verb = KillJobCommand;
        let matches = matches_for(
            &verb,
            &["kill", "--config=hello.yaml", "west/bozo/test/hello"],
        );
        let mut ctx = RecordingContext::new();
        ctx.config_error = Some("wrong cluster".into());

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIGURATION);
        assert!(ctx.api.kill_calls().is_empty());
    }

    /* ---- restart ---- */

    fn push_running_instances(ctx: &RecordingContext, count: u32) {
        let states: Vec<(u32, TaskState)> =
            (0..count).map(|i| (i, TaskState::Running)).collect();
        ctx.api.push_status_instances(&states);
    }

    #[test]
    fn restart_batches_in_ascending_order() {
        let verb = restart_verb();
        let matches = matches_for(
            &verb,
            &["restart", "--batch-size=5", "west/bozo/test/hello"],
        );
        let mut ctx = RecordingContext::new();
        // Initial active-set query plus one monitor poll per batch.
        for _ in 0..5 {
            push_running_instances(&ctx, 20);
        }

        verb.execute(&mut ctx, &matches).unwrap();

        let restarts = ctx.api.restart_calls();
        assert_eq!(restarts.len(), 4);
        assert_eq!(restarts[0].1, vec![0, 1, 2, 3, 4]);
        assert_eq!(restarts[3].1, vec![15, 16, 17, 18, 19]);
        assert_eq!(ctx.api.status_calls(), 5);
    }

    #[test]
    fn restart_shard_selection_restarts_only_those() {
        let verb = restart_verb();
        let matches = matches_for(
            &verb,
            &[
                "restart",
                "--shards=0,2,4-6",
                "--batch-size=10",
                "west/bozo/test/hello",
            ],
        );
        let mut ctx = RecordingContext::new();
        push_running_instances(&ctx, 8);
        push_running_instances(&ctx, 8);

        verb.execute(&mut ctx, &matches).unwrap();
        let restarts = ctx.api.restart_calls();
        assert_eq!(restarts.len(), 1);
        assert_eq!(restarts[0].1, vec![0, 2, 4, 5, 6]);
    }

    #[test]
    fn restart_rejects_shards_outside_the_active_set() {
        let verb = restart_verb();
        let matches = matches_for(
            &verb,
            &["restart", "--shards=1-3", "west/bozo/test/hello"],
        );
        let mut ctx = RecordingContext::new();
        push_running_instances(&ctx, 2);

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_PARAMETER);
        assert_eq!(ctx.api.status_calls(), 1);
        assert!(ctx.api.restart_calls().is_empty());
    }

    #[test]
    fn restart_failed_status_query_stops_before_any_restart() {
        let verb = restart_verb();
        let matches = matches_for(&verb, &["restart", "west/bozo/test/hello"]);
        let mut ctx = RecordingContext::new();
        ctx.api.push_status_error("scheduler unavailable");

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_NETWORK_ERROR);
        assert_eq!(ctx.api.status_calls(), 1);
        assert!(ctx.api.restart_calls().is_empty());
    }

    #[test]
    fn restart_refused_batch_stops_the_rollout() {
        let verb = restart_verb();
        let matches = matches_for(
            &verb,
            &["restart", "--batch-size=5", "west/bozo/test/hello"],
        );
        let mut ctx = RecordingContext::new();
        push_running_instances(&ctx, 20);
        ctx.api.set_restart_response(SchedulerResponse::error(
            ResponseCode::Error,
            "instance draining",
        ));

        let err = verb.execute(&mut ctx, &matches).unwrap_err();
        assert_eq!(err.code, EXIT_NETWORK_ERROR);
        assert_eq!(ctx.api.restart_calls().len(), 1);
        assert_eq!(ctx.api.status_calls(), 1);
    }

    #[test]
    fn restart_batch_size_zero_is_rejected_by_the_grammar() {
        let cli = job_command_line();
        let err = cli
            .resolve(&args(&[
                "job",
                "restart",
                "--batch-size=0",
                "west/bozo/test/hello",
            ]))
            .unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_PARAMETER);
    }

    #[test]
    fn restart_monitors_each_batch_with_its_own_shard_filter() {
        let verb = restart_verb();
        let matches = matches_for(
            &verb,
            &["restart", "--batch-size=2", "west/bozo/test/hello"],
        );
        let mut ctx = RecordingContext::new();
        // Active set of 4, then one poll per batch (2 batches).
        push_running_instances(&ctx, 4);
        push_running_instances(&ctx, 4);
        push_running_instances(&ctx, 4);

        verb.execute(&mut ctx, &matches).unwrap();
        assert_eq!(ctx.api.restart_calls().len(), 2);
        let filter = ctx.api.last_status_filter().unwrap();
        assert_eq!(filter.to_vec(), vec![2, 3]);
    }
}
