use clap::{Parser, ValueEnum};
use shopguard_adapters::{HttpScoringConfig, DEFAULT_APPROVAL_RATIO};
use shopguard_core::{ExecutorConfig, GateConfig};
use shopguard_service::{
    build_operator_router, build_router, AccountStoreConfig, ScorerConfig, ServiceConfig,
    ServiceState,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AccountStoreMode {
    Memory,
    File,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScorerMode {
    /// Random approvals at --approval-ratio, for local runs.
    Simulated,
    /// Same decision literal for every assessment.
    Fixed,
    /// Every call fails.
    Unavailable,
    /// External risk scoring service over HTTP.
    Http,
}

#[derive(Debug, Parser)]
#[command(name = "shopguardd", version, about = "Shopguard fraud-gated account service")]
struct Cli {
    /// REST socket address to bind, e.g. 127.0.0.1:8092
    #[arg(long, default_value = "127.0.0.1:8092", env = "SHOPGUARD_LISTEN")]
    listen: SocketAddr,
    /// Operator socket address serving the assessment trail. Keep it off public networks.
    #[arg(long, default_value = "127.0.0.1:8093", env = "SHOPGUARD_OPERATOR_LISTEN")]
    operator_listen: SocketAddr,
    /// Do not start the operator listener.
    #[arg(long, default_value_t = false, env = "SHOPGUARD_NO_OPERATOR")]
    no_operator: bool,
    /// Credential store backend.
    #[arg(long, value_enum, default_value_t = AccountStoreMode::File, env = "SHOPGUARD_ACCOUNT_STORE")]
    account_store: AccountStoreMode,
    /// File used to persist accounts when the file backend is selected.
    #[arg(long, default_value = "shopguard/data/accounts.json", env = "SHOPGUARD_ACCOUNT_FILE")]
    account_file: PathBuf,
    /// Risk scoring backend.
    #[arg(long, value_enum, default_value_t = ScorerMode::Simulated, env = "SHOPGUARD_SCORER")]
    scorer: ScorerMode,
    /// Share of assessments the simulated scorer approves.
    #[arg(long, default_value_t = DEFAULT_APPROVAL_RATIO, env = "SHOPGUARD_APPROVAL_RATIO")]
    approval_ratio: f64,
    /// Decision literal returned by the fixed scorer.
    #[arg(long, default_value = "Approve", env = "SHOPGUARD_FIXED_DECISION")]
    fixed_decision: String,
    /// Base url of the risk scoring service.
    #[arg(long, env = "SHOPGUARD_SCORING_URL")]
    scoring_url: Option<String>,
    /// Bearer token for the risk scoring service.
    #[arg(long, env = "SHOPGUARD_SCORING_TOKEN", hide_env_values = true)]
    scoring_token: Option<String>,
    /// Vendor environment id sent with every call.
    #[arg(long, env = "SHOPGUARD_SCORING_ENVIRONMENT")]
    scoring_environment: Option<String>,
    /// Upper bound for one risk scoring call, in milliseconds.
    #[arg(long, default_value_t = 5_000, env = "SHOPGUARD_GATE_TIMEOUT_MS")]
    gate_timeout_ms: u64,
    /// Number of gate exchanges kept for display.
    #[arg(long, default_value_t = 1024, env = "SHOPGUARD_TRAIL_CAPACITY")]
    trail_capacity: usize,
    /// Storefront name reported with sign-up assessments.
    #[arg(long, env = "SHOPGUARD_STORE_NAME")]
    store_name: Option<String>,
    /// Two-letter market code reported with sign-up assessments.
    #[arg(long, env = "SHOPGUARD_MARKET")]
    market: Option<String>,
    /// Session lifetime in minutes.
    #[arg(long, default_value_t = 720, env = "SHOPGUARD_SESSION_TTL_MINUTES")]
    session_ttl_minutes: i64,
    /// Mark session cookies Secure.
    #[arg(long, default_value_t = false, env = "SHOPGUARD_SECURE_COOKIES")]
    secure_cookies: bool,
}

fn resolve_scorer(cli: &Cli, timeout: Duration) -> anyhow::Result<ScorerConfig> {
    let scorer = match cli.scorer {
        ScorerMode::Simulated => ScorerConfig::Simulated {
            approval_ratio: cli.approval_ratio,
        },
        ScorerMode::Fixed => ScorerConfig::Fixed(cli.fixed_decision.clone()),
        ScorerMode::Unavailable => ScorerConfig::Unavailable,
        ScorerMode::Http => {
            let base_url = cli.scoring_url.clone().ok_or_else(|| {
                anyhow::anyhow!("scorer=http requires --scoring-url or SHOPGUARD_SCORING_URL")
            })?;
            ScorerConfig::Http(HttpScoringConfig {
                base_url,
                bearer_token: cli.scoring_token.clone(),
                environment_id: cli.scoring_environment.clone(),
                timeout,
            })
        }
    };

    Ok(scorer)
}

fn resolve_executor(cli: &Cli) -> ExecutorConfig {
    let mut executor = ExecutorConfig::default();
    if let Some(store_name) = &cli.store_name {
        executor.storefront.store_name = store_name.clone();
    }
    if let Some(market) = &cli.market {
        executor.storefront.market = market.to_ascii_uppercase();
    }
    executor
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "shopguard_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.gate_timeout_ms);
    let account_store = match cli.account_store {
        AccountStoreMode::Memory => AccountStoreConfig::Memory,
        AccountStoreMode::File => AccountStoreConfig::File(cli.account_file.clone()),
    };

    let config = ServiceConfig {
        account_store,
        scorer: resolve_scorer(&cli, timeout)?,
        gate: GateConfig {
            timeout,
            trail_capacity: cli.trail_capacity,
        },
        executor: resolve_executor(&cli),
        session_ttl: chrono::Duration::minutes(cli.session_ttl_minutes),
        secure_cookies: cli.secure_cookies,
    };
    let state = ServiceState::bootstrap(config).await?;
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("shopguard-service REST listening on {}", listener.local_addr()?);

    let rest_task = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(anyhow::Error::from)
    });

    let operator_task = if cli.no_operator {
        None
    } else {
        let operator = build_operator_router(state);
        let listener = tokio::net::TcpListener::bind(cli.operator_listen).await?;
        info!("shopguard-service operator listening on {}", listener.local_addr()?);
        Some(tokio::spawn(async move {
            axum::serve(listener, operator)
                .await
                .map_err(anyhow::Error::from)
        }))
    };

    if let Some(operator_task) = operator_task {
        tokio::select! {
            rest = rest_task => rest??,
            operator = operator_task => operator??,
        }
    } else {
        rest_task.await??;
    }

    Ok(())
}
