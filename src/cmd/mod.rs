/*!
Command surface.

Layout:
  dispatch.rs  noun/verb registries, CommandError, exit codes, CommandLine
  context.rs   ExecutionContext trait + default scheduler-backed context
  jobs.rs      the `job` noun (create / kill / restart)
  shards.rs    shard selector parsing

`build_command_line` assembles the application: every noun is registered
here, once, before any dispatch happens.
*/

pub mod context;
pub mod dispatch;
pub mod jobs;
pub mod shards;

pub use dispatch::{CommandError, CommandLine, EXIT_UNKNOWN_ERROR};

use jobs::JobNoun;

/// Construct the fully-registered command line.
pub fn build_command_line() -> Result<CommandLine, CommandError> {
    let mut cli = CommandLine::new("skedctl");
    cli.register_noun(Box::new(JobNoun::new()?))?;
    Ok(cli)
}
