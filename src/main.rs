use {
    adversary_lab::{
        cli::{exit_code, parse_args, LabCommand},
        cluster_finder::{find_clusters, FinderConfig, GossipSpy},
        fault_injector::{describe, FaultInjector, ProcessExecutor, RunConfig},
        process::ChildEnv,
        BOMB,
    },
    log::*,
    std::{io::Write, result::Result},
};

// exit status of a shell loop stopped by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

async fn run_cluster_finder(
    config: FinderConfig,
    child_env: ChildEnv,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!("{config}");
    let spy = GossipSpy::locate(&config.gossip_program, None, child_env)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    find_clusters(&spy, &config.node_identity, &mut out).await?;
    out.flush()?;
    Ok(())
}

async fn run_fault_injector(
    config: RunConfig,
    child_env: ChildEnv,
) -> Result<(), Box<dyn std::error::Error>> {
    let playlist = config.playlist();
    if config.dry_run {
        for line in describe(&playlist) {
            println!("{line}");
        }
        return Ok(());
    }

    info!("{config}");
    info!("Child environment: {child_env}");
    info!(
        "{BOMB}Starting fault injection: {} step(s) per pass",
        playlist.len()
    );

    let executor = ProcessExecutor::new(
        &config.adversary_program,
        &config.repair_tests_script,
        child_env,
    );
    let mut injector = FaultInjector::new(playlist, executor, config.failure_policy);

    let interrupted = tokio::select! {
        result = injector.run(config.iterations) => {
            let steps = result?;
            info!("Fault injection finished after {steps} step(s)");
            false
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping fault injection");
            true
        }
    };

    if interrupted {
        // the run future was dropped by select!, killing any in-flight child
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    solana_logger::setup_with_default("info");

    let command = match parse_args(std::env::args_os()) {
        Ok(command) => command,
        Err(err) => {
            let _ = err.print();
            std::process::exit(exit_code(&err));
        }
    };
    let child_env = ChildEnv::from_rust_log(std::env::var("RUST_LOG").ok());

    match command {
        LabCommand::FindCluster(config) => run_cluster_finder(config, child_env).await,
        LabCommand::InjectFaults(config) => run_fault_injector(config, child_env).await,
    }
}
