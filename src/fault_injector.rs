use {
    crate::{
        boxed_error,
        playlist::{Invocation, Playlist, Step, Target},
        process::ChildEnv,
    },
    log::*,
    std::{error::Error, fmt, path::PathBuf, process::Stdio, time::Duration},
};

pub const DEFAULT_ADVERSARY_PROGRAM: &str = "solana-adversary";
pub const DEFAULT_REPAIR_TESTS_SCRIPT: &str = "./repair-tests.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and move on to the next step.
    Ignore,
    /// Abort the run on the first failed invocation.
    Strict,
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub runtime: Duration,
    pub sleeptime: Duration,
    /// `None` runs until interrupted.
    pub iterations: Option<u64>,
    pub adversary_keypair: Option<String>,
    pub adversary_program: String,
    pub repair_tests_script: String,
    pub failure_policy: FailurePolicy,
    pub dry_run: bool,
}

impl RunConfig {
    pub fn playlist(&self) -> Playlist {
        Playlist::new(
            self.runtime,
            self.sleeptime,
            self.adversary_keypair.as_deref(),
        )
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let iterations = match self.iterations {
            Some(iterations) => iterations.to_string(),
            None => "forever".to_string(),
        };
        write!(
            f,
            "Fault Injector Config\n\
             runtime: {}s\n\
             sleeptime: {}s\n\
             iterations: {}\n\
             adversary_keypair: {:?}\n\
             adversary_program: {}\n\
             repair_tests_script: {}\n\
             failure_policy: {:?}\n\
             dry_run: {}",
            self.runtime.as_secs(),
            self.sleeptime.as_secs(),
            iterations,
            self.adversary_keypair,
            self.adversary_program,
            self.repair_tests_script,
            self.failure_policy,
            self.dry_run,
        )
    }
}

/// Runs a single playlist step to completion.
#[allow(async_fn_in_trait)]
pub trait StepExecutor {
    async fn execute(&mut self, step: &Step) -> Result<(), Box<dyn Error>>;
}

/// Executes invocations as child processes and sleeps on the tokio timer.
pub struct ProcessExecutor {
    adversary_program: PathBuf,
    repair_tests_script: PathBuf,
    child_env: ChildEnv,
}

impl ProcessExecutor {
    pub fn new(
        adversary_program: impl Into<PathBuf>,
        repair_tests_script: impl Into<PathBuf>,
        child_env: ChildEnv,
    ) -> Self {
        Self {
            adversary_program: adversary_program.into(),
            repair_tests_script: repair_tests_script.into(),
            child_env,
        }
    }

    fn program(&self, target: Target) -> &PathBuf {
        match target {
            Target::AdversaryTool => &self.adversary_program,
            Target::RepairTests => &self.repair_tests_script,
        }
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<(), Box<dyn Error>> {
        let program = self.program(invocation.target());
        let status = self
            .child_env
            .command(program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|err| format!("failed to run {}: {err}", program.display()))?;
        if !status.success() {
            return Err(boxed_error!(format!(
                "{} {} exited with {status}",
                program.display(),
                invocation.args().join(" ")
            )));
        }
        Ok(())
    }
}

impl StepExecutor for ProcessExecutor {
    async fn execute(&mut self, step: &Step) -> Result<(), Box<dyn Error>> {
        match step {
            Step::Invoke(invocation) => self.invoke(invocation).await,
            Step::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(())
            }
        }
    }
}

/// Position in the playlist. The next index is always
/// `executed % len`, so a pass restarts at step 0 with no drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistCursor {
    len: usize,
    executed: u64,
}

impl PlaylistCursor {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "playlist must not be empty");
        Self { len, executed: 0 }
    }

    pub fn next_index(&self) -> usize {
        (self.executed % self.len as u64) as usize
    }

    /// Returns the index to run and moves past it.
    pub fn advance(&mut self) -> usize {
        let index = self.next_index();
        self.executed += 1;
        index
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// 1-based pass number of the next step.
    pub fn pass(&self) -> u64 {
        self.executed / self.len as u64 + 1
    }
}

pub struct FaultInjector<E> {
    playlist: Playlist,
    executor: E,
    failure_policy: FailurePolicy,
}

impl<E: StepExecutor> FaultInjector<E> {
    pub fn new(playlist: Playlist, executor: E, failure_policy: FailurePolicy) -> Self {
        Self {
            playlist,
            executor,
            failure_policy,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Number of playlist steps `iterations` full passes take. `None` means
    /// unbounded.
    pub fn total_steps(&self, iterations: Option<u64>) -> Result<Option<u64>, Box<dyn Error>> {
        match iterations {
            None | Some(0) => Ok(None),
            Some(iterations) => iterations
                .checked_mul(self.playlist.len() as u64)
                .map(Some)
                .ok_or_else(|| boxed_error!(format!("--iterations {iterations} is too large"))),
        }
    }

    /// Runs the setup call, then the playlist with wraparound. Returns the
    /// number of playlist steps executed; never returns when `iterations` is
    /// unbounded unless a step fails under the strict policy.
    pub async fn run(&mut self, iterations: Option<u64>) -> Result<u64, Box<dyn Error>> {
        if self.playlist.is_empty() {
            return Err(boxed_error!("playlist is empty"));
        }
        let total_steps = self.total_steps(iterations)?;

        let Self {
            playlist,
            executor,
            failure_policy,
        } = self;

        let setup = Step::Invoke(playlist.setup().clone());
        info!("setup: {setup}");
        run_step(executor, *failure_policy, &setup).await?;

        let mut cursor = PlaylistCursor::new(playlist.len());
        while total_steps.map_or(true, |total| cursor.executed() < total) {
            let pass = cursor.pass();
            let index = cursor.advance();
            let step = &playlist.steps()[index];
            if index == 0 {
                info!("starting pass {pass}");
            }
            info!("[pass {pass} step {}/{}] {step}", index + 1, playlist.len());
            run_step(executor, *failure_policy, step).await?;
        }

        info!("completed {} step(s)", cursor.executed());
        Ok(cursor.executed())
    }
}

async fn run_step<E: StepExecutor>(
    executor: &mut E,
    failure_policy: FailurePolicy,
    step: &Step,
) -> Result<(), Box<dyn Error>> {
    match executor.execute(step).await {
        Ok(()) => Ok(()),
        Err(err) => match failure_policy {
            FailurePolicy::Ignore => {
                warn!("{step} failed, continuing: {err}");
                Ok(())
            }
            FailurePolicy::Strict => {
                error!("{step} failed: {err}");
                Err(err)
            }
        },
    }
}

/// Lines printed by `--dry-run`.
pub fn describe(playlist: &Playlist) -> Vec<String> {
    std::iter::once(format!("setup: {}", playlist.setup()))
        .chain(
            playlist
                .steps()
                .iter()
                .enumerate()
                .map(|(index, step)| format!("{:>3}: {step}", index + 1)),
        )
        .collect()
}
