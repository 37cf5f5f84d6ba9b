use std::process::ExitCode;
use std::sync::Arc;

use pdp_node::{
    ChallengeRound, ChallengeRoundCoordinator, ChallengeRoundState, ChallengeSet,
    DirFragmentStore, Domain, JsonRecordFile, KeyMaterial, LocalVerifier, ModularKeys,
    NodeConfig, PairingKeys, Policy, Result, RoundKind, partition,
};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEMO_FILES: usize = 10;
const DEMO_BLOCKS: usize = 20;
const DEMO_BLOCK_SIZE: usize = 256;
const DEMO_CHALLENGES: usize = 10;
const DEMO_MODULUS_BITS: u64 = 1024;
const STORED_AT: u32 = 1;
const CHALLENGE_AT: u32 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("verifier rejected the round");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool> {
    // Step 1: Load config from the first argument, or use defaults
    let config = match std::env::args().nth(1) {
        Some(path) => NodeConfig::load_from_file(path)?,
        None => {
            let cfg = NodeConfig::default();
            cfg.validate()?;
            cfg
        }
    };
    info!(
        "workspace {}, {} scheme",
        config.workspace.display(),
        config.scheme
    );

    // Step 2: Provision issuer keys; the prover only keeps the public part
    let issuer = match config.scheme {
        Domain::Pairing => KeyMaterial::Pairing(PairingKeys::generate()),
        Domain::Modular => KeyMaterial::Modular(ModularKeys::generate(DEMO_MODULUS_BITS)?),
    };
    let prover_keys = issuer.public_only();
    let issuer = issuer.into_scheme();

    // Step 3: Store synthetic fragments with their tags
    let store = DirFragmentStore::new(config.fragment_dir(), config.tag_dir());
    store.ensure_dirs()?;
    let mut rng = OsRng;
    for f in 0..DEMO_FILES {
        let id = format!("fragment-{:02}", f);
        let mut data = vec![0u8; DEMO_BLOCKS * DEMO_BLOCK_SIZE];
        rng.fill_bytes(&mut data);
        let matrix = partition(&data, Policy::ExactCount(DEMO_BLOCKS))?;
        let tag = issuer.issue_tag(&id, &matrix)?;
        store.write_fragment(&id, &data, STORED_AT)?;
        store.store_tag(&id, &tag)?;
    }
    info!("stored {} fragments of {} blocks", DEMO_FILES, DEMO_BLOCKS);

    // Step 4: Verifier issues a challenge
    let challenge = ChallengeSet::random(DEMO_BLOCKS, DEMO_CHALLENGES);

    // Step 5: Prover runs a service round and submits the aggregate proof
    let scheme = prover_keys.into_scheme();
    let coordinator = ChallengeRoundCoordinator::new(
        Arc::clone(&scheme),
        Arc::new(store),
        Arc::new(LocalVerifier::new(scheme)),
        ChallengeRoundState::new(),
        config.round_config(),
    )
    .with_record_sink(Arc::new(JsonRecordFile::new(config.record_path())));

    let report = coordinator
        .run_round(ChallengeRound {
            kind: RoundKind::Service,
            start: CHALLENGE_AT,
            challenge,
        })
        .await?;

    // Step 6: Verifier's verdict
    info!("Proof is valid: {}", report.verified());
    Ok(report.verified())
}
