/*!
`dispatch.rs`

Noun/verb command dispatch.

The CLI is structured around object types ("nouns", e.g. `job`) that each
expose a set of operations ("verbs", e.g. `create`). An invocation is
`skedctl <noun> <verb> [options]`: the first token selects a noun from the
registry, the second selects a verb from that noun's registry, and the rest
is parsed against the option grammar the verb declared. Both lookups fail
closed.

Failures anywhere below this layer travel as [`CommandError`] values; only
[`CommandLine::execute`] turns them into user-visible text and a process
exit code.
*/

use std::collections::BTreeMap;

use clap::ArgMatches;
use clap::error::ErrorKind;
use thiserror::Error;
use tracing::info;

use crate::cmd::context::ExecutionContext;
use crate::cmd::shards::ShardParseError;
use crate::config::ConfigError;
use crate::sched::types::{ApiError, JobKeyError};
use crate::sched::{ClustersError, MonitorError};

/* ------------------------------- Exit codes -------------------------------- */

pub const EXIT_OK: i32 = 0;
pub const EXIT_INVALID_CONFIGURATION: i32 = 3;
pub const EXIT_COMMAND_FAILURE: i32 = 4;
pub const EXIT_INVALID_COMMAND: i32 = 5;
pub const EXIT_INVALID_PARAMETER: i32 = 6;
pub const EXIT_NETWORK_ERROR: i32 = 7;
pub const EXIT_PERMISSION_VIOLATION: i32 = 8;
pub const EXIT_TIMEOUT: i32 = 9;
pub const EXIT_UNKNOWN_ERROR: i32 = 20;

/* ------------------------------ Command errors ----------------------------- */

/// A command failure: an exit code plus the message shown to the user.
///
/// Raised anywhere inside command execution and caught only by
/// [`CommandLine::execute`]. Nothing below the dispatcher terminates the
/// process.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CommandError {
    pub code: i32,
    pub message: String,
}

impl CommandError {
    pub fn new(code: i32, message: impl Into<String>) -> CommandError {
        CommandError {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_command(message: impl Into<String>) -> CommandError {
        Self::new(EXIT_INVALID_COMMAND, message)
    }

    pub fn invalid_parameter(message: impl Into<String>) -> CommandError {
        Self::new(EXIT_INVALID_PARAMETER, message)
    }

    pub fn invalid_configuration(message: impl Into<String>) -> CommandError {
        Self::new(EXIT_INVALID_CONFIGURATION, message)
    }

    pub fn command_failure(message: impl Into<String>) -> CommandError {
        Self::new(EXIT_COMMAND_FAILURE, message)
    }

    pub fn network(message: impl Into<String>) -> CommandError {
        Self::new(EXIT_NETWORK_ERROR, message)
    }

    pub fn timeout(message: impl Into<String>) -> CommandError {
        Self::new(EXIT_TIMEOUT, message)
    }
}

impl From<ShardParseError> for CommandError {
    fn from(err: ShardParseError) -> CommandError {
        CommandError::invalid_parameter(err.to_string())
    }
}

impl From<JobKeyError> for CommandError {
    fn from(err: JobKeyError) -> CommandError {
        CommandError::invalid_parameter(err.to_string())
    }
}

impl From<ConfigError> for CommandError {
    fn from(err: ConfigError) -> CommandError {
        CommandError::invalid_configuration(format!("Error loading job configuration: {err}"))
    }
}

impl From<ApiError> for CommandError {
    fn from(err: ApiError) -> CommandError {
        CommandError::network(err.to_string())
    }
}

impl From<MonitorError> for CommandError {
    fn from(err: MonitorError) -> CommandError {
        CommandError::timeout(err.to_string())
    }
}

impl From<ClustersError> for CommandError {
    fn from(err: ClustersError) -> CommandError {
        match err {
            ClustersError::Unknown { .. } => CommandError::invalid_parameter(err.to_string()),
            _ => CommandError::invalid_configuration(err.to_string()),
        }
    }
}

/* ------------------------------ Verbs and nouns ---------------------------- */

/// One operation on a noun. Implementations declare their option grammar
/// as a `clap::Command` and execute against whatever [`ExecutionContext`]
/// the dispatcher hands them.
pub trait Verb {
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str;

    /// The option grammar for this verb. The dispatcher parses everything
    /// after `<noun> <verb>` with it.
    fn options(&self) -> clap::Command;

    fn execute(
        &self,
        context: &mut dyn ExecutionContext,
        matches: &ArgMatches,
    ) -> Result<(), CommandError>;
}

/// Name-keyed verb table. Duplicate names are rejected: verbs register
/// once at startup from static code, so a collision is a programming error
/// that must not be masked by last-wins.
pub struct VerbRegistry {
    verbs: BTreeMap<&'static str, Box<dyn Verb>>,
}

impl VerbRegistry {
    pub fn new() -> VerbRegistry {
        VerbRegistry {
            verbs: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, verb: Box<dyn Verb>) -> Result<(), CommandError> {
        let name = verb.name();
        if self.verbs.contains_key(name) {
            return Err(CommandError::new(
                EXIT_UNKNOWN_ERROR,
                format!("verb '{name}' registered twice"),
            ));
        }
        self.verbs.insert(name, verb);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Verb> {
        self.verbs.get(name).map(|v| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Verb> {
        self.verbs.values().map(|v| v.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.verbs.keys().copied().collect()
    }
}

impl Default for VerbRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A type of object the CLI manipulates: a named group of verbs plus the
/// knowledge of how to build the default execution context for them.
pub trait Noun {
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str;

    fn verbs(&self) -> &VerbRegistry;

    /// Build the context verbs of this noun execute against. Runs once per
    /// invocation, after resolution and before execution; a deployment
    /// missing a required capability fails here.
    fn create_context(&self) -> Result<Box<dyn ExecutionContext>, CommandError>;
}

/* ------------------------------- Command line ------------------------------ */

/// Outcome of resolving an argument list against the registries.
pub enum Resolution<'a> {
    /// Help or version output was requested and has been printed.
    Help,
    /// A concrete verb with its parsed options.
    Command {
        noun: &'a dyn Noun,
        verb: &'a dyn Verb,
        matches: ArgMatches,
    },
}

impl std::fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Help => f.write_str("Help"),
            Resolution::Command { noun, verb, matches } => f
                .debug_struct("Command")
                .field("noun", &noun.name())
                .field("verb", &verb.name())
                .field("matches", matches)
                .finish(),
        }
    }
}

/// The top-level application: a noun registry and the dispatch loop.
pub struct CommandLine {
    program: &'static str,
    nouns: BTreeMap<&'static str, Box<dyn Noun>>,
}

impl CommandLine {
    pub fn new(program: &'static str) -> CommandLine {
        CommandLine {
            program,
            nouns: BTreeMap::new(),
        }
    }

    pub fn register_noun(&mut self, noun: Box<dyn Noun>) -> Result<(), CommandError> {
        let name = noun.name();
        if self.nouns.contains_key(name) {
            return Err(CommandError::new(
                EXIT_UNKNOWN_ERROR,
                format!("noun '{name}' registered twice"),
            ));
        }
        self.nouns.insert(name, noun);
        Ok(())
    }

    /// Run one invocation and produce the process exit code. This is the
    /// only place a [`CommandError`] becomes user-visible text.
    pub fn execute(&self, args: &[String]) -> i32 {
        match self.dispatch(args) {
            Ok(()) => {
                info!("command terminated successfully");
                EXIT_OK
            }
            Err(err) => {
                eprintln!("{}: error: {}", self.program, err.message);
                err.code
            }
        }
    }

    fn dispatch(&self, args: &[String]) -> Result<(), CommandError> {
        let Some(first) = args.first() else {
            eprintln!("{}", self.composed_help());
            return Err(CommandError::invalid_command("no command given"));
        };
        if first == "help" {
            return self.help_cmd(&args[1..]);
        }
        match self.resolve(args)? {
            Resolution::Help => Ok(()),
            Resolution::Command { noun, verb, matches } => {
                let mut context = noun.create_context()?;
                verb.execute(context.as_mut(), &matches)
            }
        }
    }

    /// Two-stage lookup: noun, then verb, then the verb's option grammar.
    /// No remote call can happen before this returns.
    pub fn resolve(&self, args: &[String]) -> Result<Resolution<'_>, CommandError> {
        let noun_name = args
            .first()
            .ok_or_else(|| CommandError::invalid_command("no command given"))?;
        let noun = self
            .nouns
            .get(noun_name.as_str())
            .map(|n| n.as_ref())
            .ok_or_else(|| {
                CommandError::invalid_command(format!("unknown noun '{noun_name}'"))
            })?;

        let verb_name = args.get(1).ok_or_else(|| {
            CommandError::invalid_command(format!(
                "noun '{}' requires a verb (one of: {})",
                noun.name(),
                noun.verbs().names().join(", ")
            ))
        })?;
        let verb = noun.verbs().get(verb_name).ok_or_else(|| {
            CommandError::invalid_command(format!(
                "noun '{}' does not have a verb '{}'",
                noun.name(),
                verb_name
            ))
        })?;

        let argv = std::iter::once(verb.name().to_string()).chain(args[2..].iter().cloned());
        match verb.options().try_get_matches_from(argv) {
            Ok(matches) => Ok(Resolution::Command { noun, verb, matches }),
            Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                print!("{err}");
                Ok(Resolution::Help)
            }
            Err(err) => Err(CommandError::invalid_parameter(err.to_string())),
        }
    }

    /* ---- Help ---- */

    /// `help`, `help <noun>`, `help <noun> <verb>`.
    fn help_cmd(&self, args: &[String]) -> Result<(), CommandError> {
        match args {
            [] => {
                println!("{}", self.composed_help());
                Ok(())
            }
            [noun_name] => {
                let noun = self.nouns.get(noun_name.as_str()).ok_or_else(|| {
                    CommandError::invalid_parameter(format!("unknown noun '{noun_name}'"))
                })?;
                println!("{}", self.noun_help(noun.as_ref()));
                Ok(())
            }
            [noun_name, verb_name] => {
                let noun = self.nouns.get(noun_name.as_str()).ok_or_else(|| {
                    CommandError::invalid_parameter(format!("unknown noun '{noun_name}'"))
                })?;
                let verb = noun.verbs().get(verb_name).ok_or_else(|| {
                    CommandError::invalid_parameter(format!(
                        "noun '{noun_name}' does not have a verb '{verb_name}'"
                    ))
                })?;
                print!("{}", verb.options().render_long_help());
                Ok(())
            }
            _ => Err(CommandError::invalid_parameter(format!(
                "unknown help request '{}'",
                args.join(" ")
            ))),
        }
    }

    fn composed_help(&self) -> String {
        let mut lines = vec![
            format!("{} - cluster scheduler client", self.program),
            String::new(),
            format!("Usage: {} <noun> <verb> [options]", self.program),
            String::new(),
        ];
        for noun in self.nouns.values() {
            lines.push(format!("Commands for {}:", noun.name()));
            for verb in noun.verbs().iter() {
                lines.push(format!(
                    "  {} {} {:<10} {}",
                    self.program,
                    noun.name(),
                    verb.name(),
                    verb.help()
                ));
            }
            lines.push(String::new());
        }
        lines.push(format!(
            "Run '{} help <noun> [verb]' for help on a specific command.",
            self.program
        ));
        lines.join("\n")
    }

    fn noun_help(&self, noun: &dyn Noun) -> String {
        let mut lines = vec![format!("{} - {}", noun.name(), noun.help()), String::new()];
        for verb in noun.verbs().iter() {
            lines.push(format!(
                "  {} {} {:<10} {}",
                self.program,
                noun.name(),
                verb.name(),
                verb.help()
            ));
        }
        lines.join("\n")
    }
}

/* --------------------------------- Tests ---------------------------------- */
