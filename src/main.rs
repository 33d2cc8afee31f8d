/*!
skedctl - command-line client for a cluster job scheduler.

Invocations have the shape:

  skedctl [-v|-vv|-q] <noun> <verb> [options]
  skedctl help [noun [verb]]

Examples:
  skedctl job create --wait_until=RUNNING west/www/prod/server server.yaml
  skedctl job kill --shards=0-2,5 west/www/prod/server
  skedctl job restart --batch-size=5 west/www/prod/server

Global flags:
  -v / -vv        Increase verbosity
  -q / --quiet    Errors only
  SKEDCTL_CLUSTERS  Path to the cluster registry file

Everything after the global flags is resolved through the noun/verb
registries; the selected verb's exit code becomes the process exit code.
*/

use std::process::ExitCode;

mod cmd;
mod config;
mod sched;
mod utils;

use cmd::EXIT_UNKNOWN_ERROR;

/// Peel `-v`/`-vv`/`--verbose`/`-q`/`--quiet` off the front of the argument
/// list. Only leading occurrences are global; anything after the noun
/// belongs to the verb's own grammar.
fn split_global_flags(args: &[String]) -> (u8, bool, Vec<String>) {
    let mut verbose: u8 = 0;
    let mut quiet = false;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    for arg in iter.by_ref() {
        match arg.as_str() {
            "-v" | "--verbose" => verbose += 1,
            "-vv" => verbose += 2,
            "-q" | "--quiet" => quiet = true,
            _ => {
                rest.push(arg.clone());
                break;
            }
        }
    }
    rest.extend(iter.cloned());
    (verbose, quiet, rest)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (verbose, quiet, rest) = split_global_flags(&args);
    utils::init_logging(utils::derive_level(verbose, quiet));

    let code = match cmd::build_command_line() {
        Ok(cli) => cli.execute(&rest),
        Err(err) => {
            eprintln!("skedctl: error: {}", err.message);
            err.code
        }
    };

    // Exit codes in this CLI fit a u8; anything else is a framework bug.
    let code = u8::try_from(code).unwrap_or(EXIT_UNKNOWN_ERROR as u8);
    ExitCode::from(code)
}
