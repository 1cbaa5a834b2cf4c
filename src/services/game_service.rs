use std::sync::Arc;

use ethers::abi::RawLog;
use ethers::contract::{abigen, ContractCall, EthEvent};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionReceipt, U256};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::indexer::evm_client::{chain_err, BattleResultFilter, EvmClient, KingdomStakers};
use crate::models::{
    BattleDetails, FairOpponent, GameStats, PendingReward, PlayerProfile, PlayerStatsLive,
    TxOutcome,
};
use crate::services::wallet;
use crate::utils::{address_key, format_token_amount_with_decimals, parse_address, parse_token_amount};

abigen!(
    StakedToken,
    r#"[
        function approve(address spender, uint256 amount) external returns (bool)
        function allowance(address owner, address spender) external view returns (uint256)
        function balanceOf(address) external view returns (uint256)
    ]"#
);

type GameMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

/// A player ranking row straight from getTopPlayers.
#[derive(Debug, Clone)]
pub struct TopPlayer {
    pub address: Address,
    pub power: U256,
    pub level: u64,
}

/// Outcome of an attack decoded from the receipt's BattleResult log.
#[derive(Debug, Clone)]
pub struct BattleSummary {
    pub attacker: Address,
    pub defender: Address,
    pub attacker_won: bool,
    pub reward: U256,
}

/// Explicitly constructed contract context: read access always, write access
/// when a signer backend was detected. Built once at startup and passed by
/// reference; no module-level singletons.
pub struct GameClient {
    client: EvmClient,
    middleware: Option<Arc<GameMiddleware>>,
    write_contract: Option<KingdomStakers<GameMiddleware>>,
    signer_address: Option<Address>,
    wallet_name: Option<&'static str>,
}

impl GameClient {
    pub fn connect(config: &Config) -> Result<Self> {
        let contract_address = parse_address(&config.contract_address)?;
        let client = EvmClient::connect(&config.rpc_url, contract_address)?;

        match wallet::preferred_wallet(config.chain_id) {
            Some(detected) => {
                let signer_address = detected.wallet.address();
                tracing::info!(
                    "Game wallet connected via {} ({})",
                    detected.name,
                    address_key(&signer_address)
                );
                let provider = (*client.provider()).clone();
                let middleware = Arc::new(SignerMiddleware::new(provider, detected.wallet));
                let write_contract = KingdomStakers::new(contract_address, middleware.clone());
                Ok(Self {
                    client,
                    middleware: Some(middleware),
                    write_contract: Some(write_contract),
                    signer_address: Some(signer_address),
                    wallet_name: Some(detected.name),
                })
            }
            None => {
                tracing::warn!("No signer backend configured; game actions are disabled");
                Ok(Self {
                    client,
                    middleware: None,
                    write_contract: None,
                    signer_address: None,
                    wallet_name: None,
                })
            }
        }
    }

    /// Explicit teardown counterpart to `connect`.
    pub fn disconnect(&self) {
        tracing::info!("Game client disconnected");
    }

    pub fn wallet_name(&self) -> &str {
        self.wallet_name.unwrap_or("read-only")
    }

    /// The event/read client, also used as the scanner's event source.
    pub fn source(&self) -> &EvmClient {
        &self.client
    }

    pub fn contract_address(&self) -> Address {
        self.client.contract_address()
    }

    fn writer(&self) -> Result<&KingdomStakers<GameMiddleware>> {
        self.write_contract.as_ref().ok_or_else(|| {
            AppError::WalletUnavailable(
                "Configure GAME_SIGNER_PRIVATE_KEY, GAME_SIGNER_KEYSTORE, or GAME_SIGNER_MNEMONIC"
                    .to_string(),
            )
        })
    }

    fn signer(&self) -> Result<Address> {
        self.signer_address.ok_or_else(|| {
            AppError::WalletUnavailable("No signer backend configured".to_string())
        })
    }
}

// ==================== READS ====================
impl GameClient {
    pub async fn player_profile(&self, player: Address) -> Result<PlayerProfile> {
        let profile = self
            .client
            .contract()
            .get_player_profile(player)
            .call()
            .await
            .map_err(chain_err)?;
        Ok(PlayerProfile {
            level: profile.0.as_u64(),
            kingdom_size: profile.1.as_u64(),
            power: profile.2.to_string(),
            total_battles: profile.3.as_u64(),
            battles_won: profile.4.as_u64(),
            win_rate: profile.5.as_u64(),
            can_be_attacked: profile.6,
            last_attack_time: profile.7.as_u64(),
            league: profile.8,
            battle_score: profile.9.as_u64(),
            league_id: profile.10.as_u64(),
        })
    }

    pub async fn player_stats(&self, player: Address) -> Result<PlayerStatsLive> {
        let stats = self
            .client
            .contract()
            .get_player_stats(player)
            .call()
            .await
            .map_err(chain_err)?;
        Ok(PlayerStatsLive {
            level: stats.0.as_u64(),
            total_battles: stats.1.as_u64(),
            battles_won: stats.2.as_u64(),
            kingdom_size: stats.3.as_u64(),
            next_attack_time: stats.4.as_u64(),
            win_rate: stats.5.as_u64(),
            league: stats.6,
            battle_score: stats.7.as_u64(),
        })
    }

    pub async fn battle_details(
        &self,
        attacker: Address,
        defender: Address,
    ) -> Result<BattleDetails> {
        let details = self
            .client
            .contract()
            .get_battle_details(attacker, defender)
            .call()
            .await
            .map_err(chain_err)?;
        Ok(BattleDetails {
            attacker_power: details.0.to_string(),
            defender_power: details.1.to_string(),
            attacker_level: details.2.as_u64(),
            defender_level: details.3.as_u64(),
            win_probability: details.4.as_u64(),
            can_attack: details.5,
            attacker_league: details.6,
            defender_league: details.7,
            is_fair_match: details.8,
        })
    }

    pub async fn game_stats(&self) -> Result<GameStats> {
        let stats = self
            .client
            .contract()
            .get_game_stats()
            .call()
            .await
            .map_err(chain_err)?;
        Ok(GameStats {
            total_players: stats.0.as_u64(),
            active_players: stats.1.as_u64(),
            total_battles: stats.2.as_u64(),
            total_kingdom_size: stats.3.as_u64(),
            strongest_player: address_key(&stats.4),
            strongest_player_power: stats.5.to_string(),
            league_counts: stats.6.into_iter().map(|c| c.as_u64()).collect(),
        })
    }

    pub async fn top_players(&self, top_n: u64) -> Result<Vec<TopPlayer>> {
        let (players, powers, levels) = self
            .client
            .contract()
            .get_top_players(U256::from(top_n))
            .call()
            .await
            .map_err(chain_err)?;
        Ok(players
            .into_iter()
            .zip(powers)
            .zip(levels)
            .map(|((address, power), level)| TopPlayer {
                address,
                power,
                level: level.as_u64(),
            })
            .collect())
    }

    pub async fn fair_opponents(&self, max_results: u64) -> Result<Vec<FairOpponent>> {
        let (opponents, powers) = self
            .client
            .contract()
            .find_fair_opponents(U256::from(max_results))
            .call()
            .await
            .map_err(chain_err)?;
        Ok(opponents
            .into_iter()
            .zip(powers)
            .map(|(address, power)| FairOpponent {
                address: address_key(&address),
                power: power.to_string(),
            })
            .collect())
    }

    pub async fn pending_reward(&self, player: Address) -> Result<PendingReward> {
        let reward = self
            .client
            .contract()
            .pending_reward(player)
            .call()
            .await
            .map_err(chain_err)?;
        Ok(PendingReward {
            raw: reward.to_string(),
            formatted: format_token_amount_with_decimals(reward, 4),
        })
    }
}

// ==================== ACTIONS ====================
impl GameClient {
    /// Stake tokens, running the allowance check + approve flow first.
    pub async fn deposit(&self, amount: &str) -> Result<TxOutcome> {
        let writer = self.writer()?;
        let amount_wei = parse_token_amount(amount)?;
        self.ensure_allowance(amount_wei).await?;

        let receipt = confirm(writer.deposit(amount_wei)).await?;
        Ok(tx_outcome(&receipt))
    }

    pub async fn withdraw(&self, amount: &str) -> Result<TxOutcome> {
        let writer = self.writer()?;
        let amount_wei = parse_token_amount(amount)?;
        let receipt = confirm(writer.withdraw(amount_wei)).await?;
        Ok(tx_outcome(&receipt))
    }

    /// Attack and decode the resulting BattleResult log from the receipt.
    pub async fn attack_player(
        &self,
        defender: Address,
    ) -> Result<(TxOutcome, Option<BattleSummary>)> {
        let writer = self.writer()?;
        let receipt = confirm(writer.attack_player(defender)).await?;
        let summary = battle_result_from_receipt(&receipt);
        if summary.is_none() {
            tracing::warn!(
                "BattleResult event not found in receipt {:#x}",
                receipt.transaction_hash
            );
        }
        Ok((tx_outcome(&receipt), summary))
    }

    /// Fires without waiting for inclusion.
    pub async fn expand_kingdom(&self) -> Result<TxOutcome> {
        let writer = self.writer()?;
        let pending = writer.expand_kingdom().send().await.map_err(chain_err)?;
        Ok(TxOutcome {
            transaction_hash: format!("{:#x}", *pending),
            block_number: None,
        })
    }

    pub async fn reset_cooldown(&self) -> Result<TxOutcome> {
        let writer = self.writer()?;
        let receipt = confirm(writer.reset_cooldown()).await?;
        Ok(tx_outcome(&receipt))
    }

    async fn ensure_allowance(&self, amount_wei: U256) -> Result<()> {
        let writer = self.writer()?;
        let middleware = self
            .middleware
            .clone()
            .ok_or_else(|| AppError::WalletUnavailable("No signer backend configured".to_string()))?;
        let owner = self.signer()?;
        let contract_address = self.contract_address();

        let token_address = writer.staked_token().call().await.map_err(chain_err)?;
        let token = StakedToken::new(token_address, middleware);

        let allowance = token
            .allowance(owner, contract_address)
            .call()
            .await
            .map_err(chain_err)?;
        if allowance < amount_wei {
            confirm(token.approve(contract_address, amount_wei)).await?;
        }
        Ok(())
    }
}

async fn confirm<D: ethers::abi::Detokenize>(
    call: ContractCall<GameMiddleware, D>,
) -> Result<TransactionReceipt> {
    let pending = call.send().await.map_err(chain_err)?;
    pending
        .await
        .map_err(chain_err)?
        .ok_or_else(|| AppError::Internal("Transaction dropped from mempool".to_string()))
}

fn tx_outcome(receipt: &TransactionReceipt) -> TxOutcome {
    TxOutcome {
        transaction_hash: format!("{:#x}", receipt.transaction_hash),
        block_number: receipt.block_number.map(|b| b.as_u64()),
    }
}

fn battle_result_from_receipt(receipt: &TransactionReceipt) -> Option<BattleSummary> {
    receipt.logs.iter().find_map(|log| {
        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };
        BattleResultFilter::decode_log(&raw)
            .ok()
            .map(|event| BattleSummary {
                attacker: event.attacker,
                defender: event.defender,
                attacker_won: event.attacker_won,
                reward: event.battle_reward,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::AbiEncode;
    use ethers::types::{Bytes, Log, H256};

    fn battle_result_log(attacker: Address, defender: Address, won: bool) -> Log {
        let mut log = Log::default();
        log.topics = vec![
            BattleResultFilter::signature(),
            H256::from(attacker),
            H256::from(defender),
        ];
        let data = (won, U256::from(1000u64), U256::from(1_700_000_000u64)).encode();
        log.data = Bytes::from(data);
        log
    }

    #[test]
    fn decodes_battle_result_from_receipt_logs() {
        let attacker = Address::from_low_u64_be(1);
        let defender = Address::from_low_u64_be(2);
        let receipt = TransactionReceipt {
            logs: vec![battle_result_log(attacker, defender, true)],
            ..Default::default()
        };

        let summary = battle_result_from_receipt(&receipt).unwrap();
        assert_eq!(summary.attacker, attacker);
        assert_eq!(summary.defender, defender);
        assert!(summary.attacker_won);
        assert_eq!(summary.reward, U256::from(1000u64));
    }

    #[test]
    fn receipt_without_battle_log_yields_none() {
        let receipt = TransactionReceipt::default();
        assert!(battle_result_from_receipt(&receipt).is_none());
    }
}
