use {
    std::{fmt, time::Duration},
    strum::IntoEnumIterator,
    strum_macros::{Display, EnumIter},
};

pub const ANCESTOR_HASH_REPAIR_SAMPLE_SIZE: u32 = 2;
pub const FLOOD_ITERATION_DELAY_US: u64 = 1_000_000;
pub const FLOOD_PACKETS_PER_PEER_PER_ITERATION: u64 = 10_000;
pub const KEYPAIR_ARG: &str = "--rpc-adversary-keypair";

/// Program an invocation is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Target {
    #[strum(serialize = "adversary")]
    AdversaryTool,
    #[strum(serialize = "repair-tests")]
    RepairTests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum InvalidationKind {
    #[strum(serialize = "invalidFeePayer")]
    InvalidFeePayer,
    #[strum(serialize = "invalidSignature")]
    InvalidSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RepairTest {
    #[strum(serialize = "minimal_packets")]
    MinimalPackets,
    #[strum(serialize = "ping_cache_overflow")]
    PingCacheOverflow,
    #[strum(serialize = "unavailable_slots")]
    UnavailableSlots,
    #[strum(serialize = "ping_overflow_with_orphan")]
    PingOverflowWithOrphan,
    #[strum(serialize = "disable")]
    Disable,
}

impl RepairTest {
    /// Scenarios run by the playlist, in order. `Disable` is the reset.
    pub const SCENARIOS: [RepairTest; 4] = [
        RepairTest::MinimalPackets,
        RepairTest::PingCacheOverflow,
        RepairTest::UnavailableSlots,
        RepairTest::PingOverflowWithOrphan,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ReplayAttack {
    #[strum(serialize = "transferRandom")]
    TransferRandom,
    #[strum(serialize = "createNonceAccounts")]
    CreateNonceAccounts,
    #[strum(serialize = "allocateRandomLarge")]
    AllocateRandomLarge,
    #[strum(serialize = "allocateRandomSmall")]
    AllocateRandomSmall,
    #[strum(serialize = "chainTransactions")]
    ChainTransactions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    target: Target,
    args: Vec<String>,
}

impl Invocation {
    fn new<I, S>(target: Target, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn adversary<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Target::AdversaryTool, args)
    }

    fn repair_test(test: RepairTest) -> Self {
        Self::new(Target::RepairTests, ["--test".to_string(), test.to_string()])
    }

    fn with_keypair(mut self, keypair: Option<&str>) -> Self {
        if let Some(keypair) = keypair {
            self.args.push(KEYPAIR_ARG.to_string());
            self.args.push(keypair.to_string());
        }
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.target)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Invoke(Invocation),
    Sleep(Duration),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Invoke(invocation) => write!(f, "{invocation}"),
            Step::Sleep(duration) => write!(f, "sleep {}s", duration.as_secs()),
        }
    }
}

/// The one-off setup call followed by the steps replayed on every pass.
#[derive(Debug, Clone)]
pub struct Playlist {
    setup: Invocation,
    steps: Vec<Step>,
}

struct PlaylistBuilder<'a> {
    runtime: Duration,
    sleeptime: Duration,
    keypair: Option<&'a str>,
    steps: Vec<Step>,
}

impl PlaylistBuilder<'_> {
    // enable, hold for runtime, reset, rest for sleeptime
    fn toggle(&mut self, enable: Invocation, reset: Invocation) {
        self.steps.extend([
            Step::Invoke(enable.with_keypair(self.keypair)),
            Step::Sleep(self.runtime),
            Step::Invoke(reset.with_keypair(self.keypair)),
            Step::Sleep(self.sleeptime),
        ]);
    }
}

impl Playlist {
    pub fn new(runtime: Duration, sleeptime: Duration, keypair: Option<&str>) -> Self {
        let setup = Invocation::adversary([
            "configure-repair-parameters".to_string(),
            "--ancestor-hash-repair-sample-size".to_string(),
            ANCESTOR_HASH_REPAIR_SAMPLE_SIZE.to_string(),
        ])
        .with_keypair(keypair);

        let mut builder = PlaylistBuilder {
            runtime,
            sleeptime,
            keypair,
            steps: vec![],
        };

        for kind in InvalidationKind::iter() {
            builder.toggle(
                Invocation::adversary([
                    "configure-invalidate-leader-block".to_string(),
                    "--invalidation-kind".to_string(),
                    kind.to_string(),
                ]),
                Invocation::adversary(["configure-invalidate-leader-block"]),
            );
        }

        builder.toggle(
            Invocation::adversary(["configure-drop-turbine-votes", "--drop", "true"]),
            Invocation::adversary(["configure-drop-turbine-votes", "--drop", "false"]),
        );

        for test in RepairTest::SCENARIOS {
            builder.toggle(
                Invocation::repair_test(test),
                Invocation::repair_test(RepairTest::Disable),
            );
        }

        builder.toggle(
            Invocation::adversary([
                "configure-gossip-packet-flood".to_string(),
                "--flood-strategy".to_string(),
                "pingCacheOverflow".to_string(),
                "--iteration-delay-us".to_string(),
                FLOOD_ITERATION_DELAY_US.to_string(),
                "--packets-per-peer-per-iteration".to_string(),
                FLOOD_PACKETS_PER_PEER_PER_ITERATION.to_string(),
            ]),
            Invocation::adversary(["configure-gossip-packet-flood"]),
        );

        for attack in ReplayAttack::iter() {
            builder.toggle(
                Invocation::adversary([
                    "configure-replay-stage-attack".to_string(),
                    "--selected-attack".to_string(),
                    attack.to_string(),
                ]),
                Invocation::adversary(["configure-replay-stage-attack"]),
            );
        }

        Self {
            setup,
            steps: builder.steps,
        }
    }

    pub fn setup(&self) -> &Invocation {
        &self.setup
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        std::iter::once(&self.setup).chain(self.steps.iter().filter_map(|step| match step {
            Step::Invoke(invocation) => Some(invocation),
            Step::Sleep(_) => None,
        }))
    }
}
