//! Multiplayer word-grid game server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin gridword-server -- --dictionary en=words/en.txt
//! cargo run --bin gridword-server -- --host 0.0.0.0 --port 3000 --oracle-url http://review:9000
//! cargo run --bin gridword-server -- --store-url http://127.0.0.1:6380
//! ```
//!
//! Without `--store-url` the shared store lives inside this process; with it,
//! every instance pointed at the same `gridword-store` shares snapshots, the
//! room-code lock and room events.

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use gridword_server::{
    config::ServerConfig,
    domain::{ArbitrationOracle, Locale, SharedStore},
    infrastructure::{
        dictionary::InMemoryDictionary,
        message_pusher::WebSocketMessagePusher,
        oracle::HttpArbitrationOracle,
        store::{InMemoryStore, RemoteStore, ResilientStore},
    },
    ui::Server,
    usecase::{
        ConnectPlayerUseCase, CreateRoomUseCase, DisconnectPlayerUseCase, GetRoomDetailUseCase,
        GetRoomsUseCase, HandleActionUseCase, InstanceHeartbeat, RateLimiter, RecoverRoomsUseCase,
        RoomRegistry, RoomRelay, ValidationPipeline, WorkerDeps,
    },
};
use gridword_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "gridword-server")]
#[command(about = "Multiplayer word-grid game server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "GRIDWORD_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "GRIDWORD_PORT", default_value = "8080")]
    port: u16,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "GRIDWORD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Word list per locale, as `locale=path` (repeatable)
    #[arg(short = 'd', long = "dictionary", env = "GRIDWORD_DICTIONARIES", value_delimiter = ',')]
    dictionaries: Vec<String>,

    /// Base URL of the arbitration service for words missing from the dictionary
    #[arg(long, env = "GRIDWORD_ORACLE_URL")]
    oracle_url: Option<String>,

    /// Reject unknown words instead of holding them for arbitration
    #[arg(long, env = "GRIDWORD_REJECT_UNKNOWN_WORDS")]
    reject_unknown_words: bool,

    /// Default round length in seconds
    #[arg(long, env = "GRIDWORD_ROUND_SECS", default_value = "60")]
    round_secs: u64,

    /// Maximum number of players per room
    #[arg(long, env = "GRIDWORD_MAX_PLAYERS", default_value = "8")]
    max_players: usize,

    /// Grace period for a disconnected player, in seconds
    #[arg(long, env = "GRIDWORD_PLAYER_GRACE_SECS", default_value = "30")]
    player_grace_secs: u64,

    /// Grace period for a disconnected room owner, in seconds
    #[arg(long, env = "GRIDWORD_OWNER_GRACE_SECS", default_value = "300")]
    owner_grace_secs: u64,

    /// Seconds a waiting room may stay idle before it is closed
    #[arg(long, env = "GRIDWORD_IDLE_TIMEOUT_SECS", default_value = "600")]
    idle_timeout_secs: u64,

    /// Base URL of a shared `gridword-store` service (in-process store when unset)
    #[arg(long, env = "GRIDWORD_STORE_URL")]
    store_url: Option<String>,

    /// Seconds between heartbeats and relay scans for rooms hosted by other instances
    #[arg(long, env = "GRIDWORD_RELAY_INTERVAL_SECS", default_value = "5")]
    relay_interval_secs: u64,

    /// Stable instance id; reuse it across restarts to reclaim this instance's rooms at once
    #[arg(long, env = "GRIDWORD_INSTANCE_ID")]
    instance_id: Option<String>,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.game.default_duration_secs = self.round_secs;
        config.game.max_players = self.max_players;
        config.game.idle_timeout = Duration::from_secs(self.idle_timeout_secs);
        config.game.review_unknown_words = !self.reject_unknown_words;
        config.presence.player_grace = Duration::from_secs(self.player_grace_secs);
        config.presence.owner_grace = Duration::from_secs(self.owner_grace_secs);
        config.store.relay_interval = Duration::from_secs(self.relay_interval_secs.max(1));
        if let Some(id) = &self.instance_id {
            config.store.instance_id = id.clone();
        }
        config
    }
}

fn load_dictionary(specs: &[String]) -> Result<InMemoryDictionary, Box<dyn std::error::Error>> {
    let mut dictionary = InMemoryDictionary::new();
    for spec in specs {
        let (locale, path) = spec
            .split_once('=')
            .ok_or_else(|| format!("expected locale=path, got '{}'", spec))?;
        let locale: Locale = locale.trim().parse()?;
        dictionary.load_word_list(locale, &PathBuf::from(path.trim()))?;
    }
    if dictionary.is_empty() {
        tracing::warn!("No word lists loaded; every word goes to arbitration or is rejected");
    }
    Ok(dictionary)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_BIN_NAME"),
        &args.log_level,
    );

    if let Err(e) = run(args).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize dependencies in order:
    // 1. Config, clock and shared store
    // 2. Dictionary, oracle and validation pipeline
    // 3. MessagePusher and room registry
    // 4. UseCases (recovering rooms from the store first, then relaying the rest)
    // 5. Server
    let config = Arc::new(args.server_config());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 1. Shared store behind a circuit breaker
    let backend: Arc<dyn SharedStore> = match &args.store_url {
        Some(url) => {
            tracing::info!("Sharing room state through {}", url);
            Arc::new(RemoteStore::new(url.clone()))
        }
        None => Arc::new(InMemoryStore::new()),
    };
    let store: Arc<dyn SharedStore> = Arc::new(ResilientStore::new(backend, &config.store));
    tracing::info!("Instance id {}", config.store.instance_id);

    // 2. Validation
    let dictionary = Arc::new(load_dictionary(&args.dictionaries)?);
    let oracle = args.oracle_url.as_ref().map(|url| {
        tracing::info!("Unknown words are arbitrated by {}", url);
        Arc::new(HttpArbitrationOracle::new(url.clone())) as Arc<dyn ArbitrationOracle>
    });
    let pipeline = Arc::new(ValidationPipeline::new(
        dictionary,
        oracle,
        config.game.oracle_timeout,
        config.game.review_unknown_words,
    ));

    // 3. MessagePusher and registry
    let message_pusher = Arc::new(WebSocketMessagePusher::new());
    let registry = RoomRegistry::new(WorkerDeps {
        config: config.clone(),
        message_pusher: message_pusher.clone(),
        pipeline,
        store: Some(store.clone()),
        clock: clock.clone(),
    });

    // 4. UseCases
    let recover_rooms_usecase = RecoverRoomsUseCase::new(
        registry.clone(),
        store.clone(),
        config.clone(),
        clock.clone(),
    );
    match recover_rooms_usecase.execute().await {
        Ok(0) => {}
        Ok(count) => tracing::info!("Recovered {} rooms from the shared store", count),
        Err(e) => tracing::warn!("Room recovery skipped: {}", e),
    }
    if args.store_url.is_some() {
        InstanceHeartbeat::new(store.clone(), config.clone(), clock.clone()).spawn();
        RoomRelay::new(registry.clone(), store.clone()).spawn();
    }

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let create_room_usecase = Arc::new(CreateRoomUseCase::new(
        registry.clone(),
        Some(store.clone()),
        config.clone(),
    ));
    let connect_player_usecase = Arc::new(ConnectPlayerUseCase::new(
        message_pusher.clone(),
        clock.clone(),
    ));
    let disconnect_player_usecase = Arc::new(DisconnectPlayerUseCase::new(
        message_pusher.clone(),
        registry.clone(),
        rate_limiter.clone(),
    ));
    let handle_action_usecase = Arc::new(HandleActionUseCase::new(
        registry.clone(),
        create_room_usecase,
        rate_limiter,
        message_pusher,
    ));
    let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(registry.clone()));
    let get_room_detail_usecase = Arc::new(GetRoomDetailUseCase::new(registry));

    // 5. Create and run the server
    let server = Server::new(
        connect_player_usecase,
        disconnect_player_usecase,
        handle_action_usecase,
        get_rooms_usecase,
        get_room_detail_usecase,
    );
    server.run(args.host, args.port).await
}
