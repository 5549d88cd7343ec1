//! lockstep - run one concurrent update batch against a shared document
//!
//! 1) ドキュメントを消して seed を書く
//! 2) `--from..=--to` の ID ごとに UpdateTask を並行実行
//! 3) 最終ドキュメントとエントリ数を表示し、期待値と比較
//! 4) `--keep` がなければキーを削除
//!
//! 終了コード: 0 = 全件あり, 1 = 更新が失われた, 2 = 致命的エラー

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, ValueEnum};
use tracing::warn;

use lockstep_core::app::expected_count;
use lockstep_core::impls::redis_lock::DEFAULT_KEY_PREFIX;
use lockstep_core::impls::{
    InMemoryDocumentStore, InMemoryLockManager, RedisDocumentStore, RedisLockManager,
};
use lockstep_core::observability::{LogFormat, init_logging};
use lockstep_core::ports::{Clock, DocumentStore, LockManager, SystemClock};
use lockstep_core::{
    App, AppBuilder, BatchSettings, Document, EntryId, Isolation, LockSettings, Verification,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Concurrent read-merge-write updates, with or without a lock.
#[derive(Debug, Parser)]
#[command(name = "lockstep")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Where the document and the lock live.
    #[arg(long, value_enum, env = "LOCKSTEP_BACKEND", default_value = "memory")]
    backend: Backend,

    #[arg(long, env = "LOCKSTEP_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Key holding the shared document.
    #[arg(long, env = "LOCKSTEP_KEY", default_value = "doc")]
    key: String,

    /// Prefix of the Redis keys holding lock entries.
    #[arg(long, env = "LOCKSTEP_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    key_prefix: String,

    /// Lock resource guarding the document.
    #[arg(long, env = "LOCKSTEP_RESOURCE", default_value = "a")]
    resource: String,

    /// First id of the batch (inclusive).
    #[arg(long, default_value_t = 2)]
    from: u64,

    /// Last id of the batch (inclusive).
    #[arg(long, default_value_t = 100)]
    to: u64,

    /// Ids written before the batch starts.
    #[arg(long = "seed", default_values_t = [1u64])]
    seeds: Vec<u64>,

    /// Start from an absent document instead.
    #[arg(long, conflicts_with = "seeds")]
    no_seed: bool,

    #[arg(long, env = "LOCKSTEP_TTL_MS", default_value_t = 5000)]
    ttl_ms: u64,

    /// Skip the lock entirely (demonstrates lost updates).
    #[arg(long = "unsafe")]
    unsynchronized: bool,

    /// Leave the document in place after the run.
    #[arg(long)]
    keep: bool,

    #[arg(long, value_enum, env = "LOCKSTEP_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormatArg,

    #[command(flatten)]
    lock: LockArgs,
}

#[derive(Debug, Args)]
struct LockArgs {
    #[arg(long, env = "LOCKSTEP_DRIFT_FACTOR", default_value_t = 0.01)]
    drift_factor: f64,

    /// Maximum acquisition attempts, the first one included.
    #[arg(long, env = "LOCKSTEP_RETRY_COUNT", default_value_t = 10)]
    retry_count: u32,

    #[arg(long, env = "LOCKSTEP_RETRY_DELAY_MS", default_value_t = 100)]
    retry_delay_ms: u64,

    #[arg(long, env = "LOCKSTEP_RETRY_JITTER_MS", default_value_t = 200)]
    retry_jitter_ms: u64,

    /// 0 disables automatic extension.
    #[arg(long, env = "LOCKSTEP_EXTENSION_THRESHOLD_MS", default_value_t = 500)]
    extension_threshold_ms: u64,
}

impl From<&LockArgs> for LockSettings {
    fn from(args: &LockArgs) -> Self {
        LockSettings {
            drift_factor: args.drift_factor,
            retry_count: args.retry_count,
            retry_delay_ms: args.retry_delay_ms,
            retry_jitter_ms: args.retry_jitter_ms,
            automatic_extension_threshold_ms: args.extension_threshold_ms,
        }
    }
}

impl Cli {
    fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            resource: self.resource.clone(),
            ttl_ms: self.ttl_ms,
            isolation: if self.unsynchronized {
                Isolation::Unsynchronized
            } else {
                Isolation::Exclusive
            },
        }
    }

    fn seed(&self) -> Document {
        if self.no_seed {
            return Document::empty();
        }
        Document::seeded(self.seeds.iter().copied().map(EntryId::from))
    }

    fn ids(&self) -> Result<Vec<EntryId>> {
        if self.from > self.to {
            bail!("--from ({}) must not be greater than --to ({})", self.from, self.to);
        }
        Ok(EntryId::range(self.from, self.to))
    }
}

async fn connect(cli: &Cli) -> Result<(Arc<dyn DocumentStore>, Arc<dyn LockManager>)> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let settings = LockSettings::from(&cli.lock);

    match cli.backend {
        Backend::Memory => Ok((
            Arc::new(InMemoryDocumentStore::new(cli.key.clone())),
            Arc::new(InMemoryLockManager::new(settings, clock)),
        )),
        Backend::Redis => {
            let store = RedisDocumentStore::connect(&cli.redis_url, cli.key.clone())
                .await
                .with_context(|| format!("connecting to {}", cli.redis_url))?;
            let locks = RedisLockManager::new(store.connection(), settings, clock)
                .with_key_prefix(cli.key_prefix.clone());
            Ok((Arc::new(store), Arc::new(locks)))
        }
    }
}

async fn run(cli: Cli) -> Result<Verification> {
    let ids = cli.ids()?;
    let seed = cli.seed();
    let (store, locks) = connect(&cli).await?;

    let app = AppBuilder::new()
        .store(store)
        .lock_manager(locks)
        .settings(cli.batch_settings())
        .build()
        .context("invalid configuration")?;

    let verification = execute(&app, &seed, &ids).await;

    if !cli.keep {
        app.cleanup().await.context("deleting the document")?;
    }
    verification
}

async fn execute(app: &App, seed: &Document, ids: &[EntryId]) -> Result<Verification> {
    app.prepare(seed).await.context("seeding the document")?;

    let batch = app.run(ids).await;
    for (id, cause) in batch.failures() {
        warn!(%id, error = %cause, "update did not land");
    }

    let document = app
        .verifier()
        .final_document()
        .await
        .context("reading the final document")?;
    println!("{}", serde_json::to_string(&document)?);
    println!("entries: {}", document.len());

    let verification = app
        .verifier()
        .verify(expected_count(seed, ids))
        .await
        .context("verifying the final document")?;
    Ok(verification)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format.into());

    match run(cli).await {
        Ok(Verification::Pass(_)) => ExitCode::SUCCESS,
        Ok(verification @ Verification::Fail { .. }) => {
            if let Err(err) = verification.into_result() {
                eprintln!("{err}");
            }
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_the_classic_run() {
        let cli = Cli::parse_from(["lockstep"]);
        assert_eq!(cli.backend, Backend::Memory);
        assert_eq!(cli.key, "doc");
        assert_eq!(cli.key_prefix, "lock:");
        assert_eq!(cli.ids().unwrap().len(), 99);
        assert_eq!(cli.seed(), Document::seeded([EntryId::from(1)]));

        let batch = cli.batch_settings();
        assert_eq!(batch, BatchSettings::default());
        assert_eq!(LockSettings::from(&cli.lock), LockSettings::default());
    }

    #[test]
    fn key_prefix_is_configurable() {
        let cli = Cli::parse_from(["lockstep", "--backend", "redis", "--key-prefix", "dev:locks:"]);
        assert_eq!(cli.backend, Backend::Redis);
        assert_eq!(cli.key_prefix, "dev:locks:");
    }

    #[test]
    fn unsafe_flag_drops_the_lock() {
        let cli = Cli::parse_from(["lockstep", "--unsafe"]);
        assert_eq!(cli.batch_settings().isolation, Isolation::Unsynchronized);
    }

    #[rstest]
    #[case(&["lockstep", "--seed", "5", "--seed", "7"], 2)]
    #[case(&["lockstep", "--no-seed"], 0)]
    fn seeds_are_configurable(#[case] args: &[&str], #[case] entries: usize) {
        let cli = Cli::parse_from(args);
        assert_eq!(cli.seed().len(), entries);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let cli = Cli::parse_from(["lockstep", "--from", "10", "--to", "3"]);
        assert!(cli.ids().is_err());
    }

    #[test]
    fn lock_flags_flow_into_settings() {
        let cli = Cli::parse_from([
            "lockstep",
            "--retry-count",
            "3",
            "--retry-jitter-ms",
            "0",
            "--extension-threshold-ms",
            "0",
        ]);
        let settings = LockSettings::from(&cli.lock);
        assert_eq!(settings.retry_count, 3);
        assert_eq!(settings.retry_jitter_ms, 0);
        assert_eq!(settings.automatic_extension_threshold_ms, 0);
    }

    #[tokio::test]
    async fn memory_backend_runs_end_to_end() {
        let cli = Cli::parse_from(["lockstep", "--to", "20"]);
        let verification = run(cli).await.unwrap();
        assert_eq!(verification, Verification::Pass(20));
    }
}
