/// Application constants

// Core chain defaults
pub const DEFAULT_RPC_URL: &str = "https://rpc.coredao.org";
pub const DEFAULT_CHAIN_ID: u64 = 1116;

// Staked/reward token decimals on Core
pub const TOKEN_DECIMALS: u32 = 18;

// Battle log scanner
pub const INITIAL_RECENT_BLOCKS: u64 = 10_000;
pub const SCAN_CHUNK_SIZE: u64 = 30_000;
pub const MAX_BLOCKS_TO_SCAN: u64 = 100_000;
pub const MAX_SCAN_RESULTS: usize = 100;
// Total subdivision attempts allowed when the provider rejects wide ranges
pub const MAX_RANGE_SPLITS: u32 = 32;

// Event synchronizer
pub const SYNC_CHUNK_SIZE: u64 = 1_000;

// Background service intervals
pub const SYNC_INTERVAL_SECS: u64 = 60;
pub const LEADERBOARD_REFRESH_INTERVAL_SECS: u64 = 120;
pub const STATS_REFRESH_INTERVAL_SECS: u64 = 10;
pub const REWARD_REFRESH_INTERVAL_SECS: u64 = 15;

// How far back "recently active" reaches for the stats poller
pub const ACTIVE_PLAYER_WINDOW_MINUTES: i64 = 30;
pub const LEADERBOARD_TOP_N: u64 = 100;

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const WS_CLIENT_TIMEOUT_SECS: u64 = 60;

// API version
pub const API_VERSION: &str = "v1";
