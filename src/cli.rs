use {
    crate::{
        cluster_finder::{FinderConfig, DEFAULT_GOSSIP_PROGRAM},
        fault_injector::{
            FailurePolicy, RunConfig, DEFAULT_ADVERSARY_PROGRAM, DEFAULT_REPAIR_TESTS_SCRIPT,
        },
    },
    clap::{command, Arg, ArgMatches, Command, ErrorKind},
    std::{ffi::OsString, time::Duration},
};

pub enum LabCommand {
    FindCluster(FinderConfig),
    InjectFaults(RunConfig),
}

fn is_u64(value: &str) -> Result<(), String> {
    value
        .parse::<u64>()
        .map(|_| ())
        .map_err(|err| format!("'{value}' is not a whole number: {err}"))
}

pub fn app() -> Command<'static> {
    command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("cluster-finder")
                .about("Find which public cluster(s) a node identity is visible on")
                .arg(
                    Arg::new("node_pubkey")
                        .value_name("NODE_PUBKEY")
                        .takes_value(true)
                        .required(true)
                        .help("Identity pubkey of the node to search for"),
                )
                .arg(
                    Arg::new("gossip_bin")
                        .long("gossip-bin")
                        .takes_value(true)
                        .default_value(DEFAULT_GOSSIP_PROGRAM)
                        .help("solana-gossip program used for the spy lookup. Bare names are searched on PATH"),
                ),
        )
        .subcommand(
            Command::new("fault-injector")
                .about("Cycle a validator under test through adversarial configurations")
                .arg(
                    Arg::new("runtime")
                        .long("runtime")
                        .value_name("SECS")
                        .takes_value(true)
                        .required(true)
                        .validator(is_u64)
                        .help("Seconds to keep each adversarial condition enabled"),
                )
                .arg(
                    Arg::new("sleeptime")
                        .long("sleeptime")
                        .value_name("SECS")
                        .takes_value(true)
                        .required(true)
                        .validator(is_u64)
                        .help("Seconds to rest after each condition is reset"),
                )
                .arg(
                    Arg::new("iterations")
                        .long("iterations")
                        .value_name("COUNT")
                        .takes_value(true)
                        .validator(is_u64)
                        .help("Number of full passes through the playlist. 0 or unset runs forever"),
                )
                .arg(
                    Arg::new("rpc_adversary_keypair")
                        .long("rpc-adversary-keypair")
                        .value_name("PATH")
                        .takes_value(true)
                        .help("Keypair forwarded to every adversary and repair-test invocation"),
                )
                .arg(
                    Arg::new("adversary_bin")
                        .long("adversary-bin")
                        .value_name("PATH")
                        .takes_value(true)
                        .default_value(DEFAULT_ADVERSARY_PROGRAM)
                        .help("Adversary configuration program"),
                )
                .arg(
                    Arg::new("repair_tests_script")
                        .long("repair-tests-script")
                        .value_name("PATH")
                        .takes_value(true)
                        .default_value(DEFAULT_REPAIR_TESTS_SCRIPT)
                        .help("Repair protocol test script"),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Abort on the first failed invocation instead of logging it and continuing"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .help("Print the setup call and the playlist, then exit without running anything"),
                ),
        )
}

fn finder_config(matches: &ArgMatches) -> FinderConfig {
    //unwraps are safe here. since their requirement is enforced by argmatches
    FinderConfig {
        node_identity: matches.value_of("node_pubkey").unwrap().to_string(),
        gossip_program: matches.value_of("gossip_bin").unwrap().to_string(),
    }
}

fn run_config(matches: &ArgMatches) -> Result<RunConfig, clap::Error> {
    let iterations = match matches.value_of("iterations") {
        Some(_) => Some(matches.value_of_t::<u64>("iterations")?),
        None => None,
    };

    Ok(RunConfig {
        runtime: Duration::from_secs(matches.value_of_t("runtime")?),
        sleeptime: Duration::from_secs(matches.value_of_t("sleeptime")?),
        iterations: iterations.filter(|iterations| *iterations > 0),
        adversary_keypair: matches
            .value_of("rpc_adversary_keypair")
            .map(str::to_string),
        adversary_program: matches.value_of("adversary_bin").unwrap().to_string(),
        repair_tests_script: matches
            .value_of("repair_tests_script")
            .unwrap()
            .to_string(),
        failure_policy: if matches.is_present("strict") {
            FailurePolicy::Strict
        } else {
            FailurePolicy::Ignore
        },
        dry_run: matches.is_present("dry_run"),
    })
}

pub fn parse_args<I, T>(args: I) -> Result<LabCommand, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = app().try_get_matches_from(args)?;
    match matches.subcommand() {
        Some(("cluster-finder", matches)) => Ok(LabCommand::FindCluster(finder_config(matches))),
        Some(("fault-injector", matches)) => run_config(matches).map(LabCommand::InjectFaults),
        _ => unreachable!("subcommand_required is set"),
    }
}

/// `--help` and `--version` succeed, every other parse error is a usage error.
pub fn exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}
