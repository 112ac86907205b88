use {
    crate::{boxed_error, new_spinner_progress_bar, process::ChildEnv, LOOKING_GLASS},
    log::*,
    std::{
        error::Error,
        ffi::OsStr,
        fmt,
        io::Write,
        path::{Path, PathBuf},
        process::Stdio,
    },
    strum::IntoEnumIterator,
    strum_macros::{Display, EnumIter},
};

pub const DEFAULT_GOSSIP_PROGRAM: &str = "solana-gossip";
pub const SPY_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Cluster {
    #[strum(serialize = "mainnet-beta")]
    MainnetBeta,
    #[strum(serialize = "testnet")]
    Testnet,
    #[strum(serialize = "devnet")]
    Devnet,
}

impl Cluster {
    pub fn entrypoint(&self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "entrypoint2.mainnet-beta.solana.com:8001",
            Cluster::Testnet => "entrypoint2.testnet.solana.com:8001",
            Cluster::Devnet => "entrypoint2.devnet.solana.com:8001",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FinderConfig {
    pub node_identity: String,
    pub gossip_program: String,
}

impl fmt::Display for FinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Cluster Finder Config\n\
             node_identity: {}\n\
             gossip_program: {}",
            self.node_identity, self.gossip_program,
        )
    }
}

/// Answers whether a node is visible through a cluster entrypoint.
#[allow(async_fn_in_trait)]
pub trait ClusterLookup {
    async fn is_member(&self, cluster: Cluster, node_identity: &str) -> bool;
}

/// Passive lookup through `solana-gossip spy`.
pub struct GossipSpy {
    program: PathBuf,
    child_env: ChildEnv,
}

impl GossipSpy {
    /// Fails when `program` cannot be resolved, so no lookup can run
    /// without a usable gossip binary.
    pub fn locate(
        program: &str,
        search_path: Option<&OsStr>,
        child_env: ChildEnv,
    ) -> Result<Self, Box<dyn Error>> {
        let program = crate::process::locate_program(program, search_path).ok_or_else(|| {
            boxed_error!(format!(
                "{program} not found. Install it or pass its location with --gossip-bin"
            ))
        })?;
        debug!("using gossip program {}", program.display());
        Ok(Self { program, child_env })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn spy_args(cluster: Cluster, node_identity: &str) -> Vec<String> {
        vec![
            "spy".to_string(),
            "--entrypoint".to_string(),
            cluster.entrypoint().to_string(),
            "--pubkey".to_string(),
            node_identity.to_string(),
            "--timeout".to_string(),
            SPY_TIMEOUT_SECS.to_string(),
        ]
    }
}

impl ClusterLookup for GossipSpy {
    async fn is_member(&self, cluster: Cluster, node_identity: &str) -> bool {
        let progress_bar = new_spinner_progress_bar();
        progress_bar.set_message(format!(
            "{LOOKING_GLASS}Searching {cluster} ({})...",
            cluster.entrypoint()
        ));

        let status = self
            .child_env
            .command(&self.program)
            .args(Self::spy_args(cluster, node_identity))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        progress_bar.finish_and_clear();

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                debug!("{node_identity} not seen on {cluster}: spy exited with {status}");
                false
            }
            Err(err) => {
                debug!("{node_identity} not seen on {cluster}: failed to run spy: {err}");
                false
            }
        }
    }
}

/// Probes every known cluster in order, writing one `found:` line to `out`
/// for each cluster the node answers on.
pub async fn find_clusters<L, W>(
    lookup: &L,
    node_identity: &str,
    out: &mut W,
) -> Result<Vec<Cluster>, Box<dyn Error>>
where
    L: ClusterLookup,
    W: Write,
{
    if node_identity.trim().is_empty() {
        return Err(boxed_error!("node identity must not be empty"));
    }

    let mut found = vec![];
    for cluster in Cluster::iter() {
        if lookup.is_member(cluster, node_identity).await {
            writeln!(out, "found: {cluster} ({})", cluster.entrypoint())?;
            found.push(cluster);
        }
    }
    info!("{node_identity} found on {} cluster(s)", found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use {super::*, std::cell::RefCell};

    struct FakeLookup {
        members: Vec<Cluster>,
        probed: RefCell<Vec<(Cluster, String)>>,
    }

    impl FakeLookup {
        fn new(members: &[Cluster]) -> Self {
            Self {
                members: members.to_vec(),
                probed: RefCell::new(vec![]),
            }
        }
    }

    impl ClusterLookup for FakeLookup {
        async fn is_member(&self, cluster: Cluster, node_identity: &str) -> bool {
            self.probed
                .borrow_mut()
                .push((cluster, node_identity.to_string()));
            self.members.contains(&cluster)
        }
    }

    const NODE: &str = "dv1ZAGvdsz5hHLwWXsVnM94hWf1pjbKVau1QVkaMJ92";

    fn found_lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out)
            .lines()
            .filter(|line| line.starts_with("found:"))
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn reports_only_the_devnet_match() {
        let lookup = FakeLookup::new(&[Cluster::Devnet]);
        let mut out = vec![];

        let found = find_clusters(&lookup, NODE, &mut out).await.unwrap();

        assert_eq!(found, vec![Cluster::Devnet]);
        assert_eq!(
            found_lines(&out),
            vec!["found: devnet (entrypoint2.devnet.solana.com:8001)".to_string()]
        );
    }

    #[tokio::test]
    async fn probes_every_cluster_in_fixed_order() {
        let lookup = FakeLookup::new(&[Cluster::MainnetBeta, Cluster::Testnet]);
        let mut out = vec![];

        find_clusters(&lookup, NODE, &mut out).await.unwrap();

        let probed: Vec<_> = lookup.probed.borrow().iter().map(|(c, _)| *c).collect();
        assert_eq!(
            probed,
            vec![Cluster::MainnetBeta, Cluster::Testnet, Cluster::Devnet]
        );
        assert!(lookup.probed.borrow().iter().all(|(_, id)| id == NODE));
        assert_eq!(
            found_lines(&out),
            vec![
                "found: mainnet-beta (entrypoint2.mainnet-beta.solana.com:8001)".to_string(),
                "found: testnet (entrypoint2.testnet.solana.com:8001)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn no_match_is_not_an_error() {
        let lookup = FakeLookup::new(&[]);
        let mut out = vec![];

        let found = find_clusters(&lookup, NODE, &mut out).await.unwrap();

        assert!(found.is_empty());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn empty_identity_is_rejected_before_any_lookup() {
        let lookup = FakeLookup::new(&[Cluster::Devnet]);
        let mut out = vec![];

        assert!(find_clusters(&lookup, "", &mut out).await.is_err());
        assert!(lookup.probed.borrow().is_empty());
    }

    #[test]
    fn missing_gossip_program_fails_to_locate() {
        let empty = tempfile::tempdir().unwrap();
        let result = GossipSpy::locate(
            DEFAULT_GOSSIP_PROGRAM,
            Some(empty.path().as_os_str()),
            ChildEnv::default(),
        );
        let err = result.err().unwrap();
        assert!(err.to_string().contains("solana-gossip not found"));
    }

    #[test]
    fn spy_args_carry_entrypoint_identity_and_timeout() {
        assert_eq!(
            GossipSpy::spy_args(Cluster::Testnet, NODE),
            vec![
                "spy",
                "--entrypoint",
                "entrypoint2.testnet.solana.com:8001",
                "--pubkey",
                NODE,
                "--timeout",
                "60"
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spy_exit_status_decides_membership() {
        use std::{fs, os::unix::fs::PermissionsExt};

        // fake spy: succeeds only for the devnet entrypoint
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("solana-gossip");
        fs::write(
            &program,
            "#!/bin/sh\ncase \"$3\" in *devnet*) exit 0 ;; *) exit 1 ;; esac\n",
        )
        .unwrap();
        fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

        let spy = GossipSpy::locate(
            DEFAULT_GOSSIP_PROGRAM,
            Some(dir.path().as_os_str()),
            ChildEnv::default(),
        )
        .unwrap();
        assert_eq!(spy.program(), program.as_path());

        let mut out = vec![];
        let found = find_clusters(&spy, NODE, &mut out).await.unwrap();
        assert_eq!(found, vec![Cluster::Devnet]);
        assert_eq!(found_lines(&out).len(), 1);
    }
}
