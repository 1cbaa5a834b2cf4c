pub mod game;

pub use game::{
    ApiResponse,
    Battle,
    BattleDetails,
    BattleHistoryEntry,
    FairOpponent,
    GameStats,
    LeaderboardEntry,
    NewBattle,
    NewBattleHistoryEntry,
    NewLeaderboardEntry,
    NewPlayerStats,
    PaginatedResponse,
    PendingReward,
    PlayerEvent,
    PlayerProfile,
    PlayerStatsCache,
    PlayerStatsLive,
    SyncStatus,
    TutorialProgress,
    TxOutcome,
};
