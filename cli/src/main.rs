use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use votes::{
    election::{Catalog, Election},
    load::{Dispatcher, LoadConfig},
    store::{RespConfig, RespStore},
    tally::{compute_results, Threshold},
    vote::{cast_vote, clear_votes},
    Error,
};

/// Casts votes against a replicated counter store and tallies them.
#[derive(Parser, Debug)]
#[command(name = "votes")]
struct Args {
    /// Election definition (JSON).
    election: PathBuf,

    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// Primary of the counter store (RESP), e.g. `172.28.0.10:6379`.
    #[arg(long, global = true, default_value = "127.0.0.1:6379")]
    node: SocketAddr,

    /// Replicas behind the primary. Consistency levels are counted
    /// against primary plus replicas.
    #[arg(long, global = true, default_value_t = 0)]
    replicas: usize,

    /// Namespace for counter keys.
    #[arg(long, global = true, default_value = "elections")]
    key_prefix: String,

    /// Connections opened to the primary.
    #[arg(long, global = true, default_value_t = 4)]
    pool_size: usize,

    /// Per-command timeout (network + server response).
    #[arg(long, global = true, default_value = "10s")]
    op_timeout: humantime::Duration,
}

impl StoreArgs {
    fn config(&self) -> RespConfig {
        RespConfig::builder()
            .addr(self.node)
            .key_prefix(self.key_prefix.clone())
            .replicas(self.replicas)
            .pool_size(self.pool_size)
            .op_timeout(self.op_timeout.into())
            .build()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cast a single vote. Each argument is an id or a name.
    Vote {
        district: String,
        party: String,
        candidate: String,
    },
    /// Spread a number of random votes evenly over a time span.
    VoteLoad {
        /// Time span in seconds.
        seconds: u64,
        /// Number of votes.
        votes: u32,
        /// Concurrent submitters.
        #[arg(long, default_value_t = 10)]
        workers: usize,
        /// Random seed (0 picks a random seed).
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Tally the votes and check every party against the threshold.
    Results {
        /// Percentage of all votes a party needs to pass.
        #[arg(long, default_value_t = 5)]
        threshold: u8,
    },
    /// Reset every counter.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let election = Election::load(&args.election)
        .with_context(|| format!("load {}", args.election.display()))?;
    let catalog = Arc::new(Catalog::new(election).context("validation error")?);
    info!(
        election = %catalog.election().election_id,
        districts = catalog.districts().len(),
        "election loaded"
    );

    let store = RespStore::connect(args.store.config())
        .await
        .with_context(|| format!("connect to {}", args.store.node))?;
    let store = Arc::new(store);
    info!(
        node = %store.config().addr,
        replicas = store.config().replicas,
        prefix = %store.config().key_prefix,
        "counter store ready"
    );

    match args.cmd {
        Command::Vote {
            district,
            party,
            candidate,
        } => {
            let vote = catalog.resolve(&district, &party, &candidate)?;
            cast_vote(&store, &vote).await.context("cast vote")?;
            println!(
                "Voted for candidate {} (ID: {}) from party {} (ID: {}) in \
                 district {} (ID: {})",
                vote.candidate.name,
                vote.candidate.candidate_id,
                vote.party.party_name,
                vote.party.party_id,
                vote.district.name,
                vote.district.district_id,
            );
        }
        Command::VoteLoad {
            seconds,
            votes,
            workers,
            seed,
        } => {
            let config = LoadConfig::builder()
                .duration_secs(seconds)
                .votes(votes)
                .workers(workers)
                .seed(seed)
                .build();
            let dispatcher = Dispatcher::new(catalog.clone(), store, config)
                .context("generate vote load")?;
            let summary = dispatcher
                .run_until(async {
                    // without a signal handler the run just goes to the end
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                })
                .await
                .context("generate vote load")?;
            println!(
                "Submitted {} votes in {} seconds",
                summary.ticks, seconds
            );
            if summary.cancelled {
                println!("Cancelled after {:.1?}", summary.elapsed);
            }
            if summary.failed_workers > 0 {
                println!(
                    "{} of {} workers stopped after a failed vote, {} votes \
                     stored",
                    summary.failed_workers, workers, summary.submitted
                );
            }
        }
        Command::Results { threshold } => {
            let threshold = Threshold::new(threshold)?;
            match compute_results(&catalog, &store, threshold).await {
                Ok(report) => print!("{report}"),
                Err(Error::NoVotesRecorded) => {
                    println!("Total Votes: 0");
                    println!("No votes recorded");
                }
                Err(e) => return Err(e).context("compute results"),
            }
        }
        Command::Clear => {
            clear_votes(&store).await.context("clear votes")?;
            println!("All votes cleared");
        }
    }

    Ok(())
}
