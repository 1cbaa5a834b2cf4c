use ethers::signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer};

/// A usable signing backend, named after where the key came from.
pub struct DetectedWallet {
    pub name: &'static str,
    pub wallet: LocalWallet,
}

/// Probe the configured signer backends in preference order. A backend that
/// is present but fails to decode is logged and skipped so the next one can
/// win.
pub fn detect_available_wallets(chain_id: u64) -> Vec<DetectedWallet> {
    detect_from(chain_id, &|name| std::env::var(name).ok())
}

/// First-found-wins across the detected backends.
pub fn preferred_wallet(chain_id: u64) -> Option<DetectedWallet> {
    detect_available_wallets(chain_id).into_iter().next()
}

fn detect_from(
    chain_id: u64,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Vec<DetectedWallet> {
    let mut wallets = Vec::new();

    if let Some(raw_key) = non_empty(lookup("GAME_SIGNER_PRIVATE_KEY")) {
        let normalized = raw_key.trim().trim_start_matches("0x").to_string();
        match normalized.parse::<LocalWallet>() {
            Ok(wallet) => wallets.push(DetectedWallet {
                name: "Private Key",
                wallet: wallet.with_chain_id(chain_id),
            }),
            Err(err) => tracing::warn!("GAME_SIGNER_PRIVATE_KEY is not a valid key: {}", err),
        }
    }

    if let (Some(path), Some(password)) = (
        non_empty(lookup("GAME_SIGNER_KEYSTORE")),
        non_empty(lookup("GAME_SIGNER_KEYSTORE_PASSWORD")),
    ) {
        match LocalWallet::decrypt_keystore(&path, &password) {
            Ok(wallet) => wallets.push(DetectedWallet {
                name: "Keystore",
                wallet: wallet.with_chain_id(chain_id),
            }),
            Err(err) => tracing::warn!("Failed to decrypt keystore {}: {}", path, err),
        }
    }

    if let Some(phrase) = non_empty(lookup("GAME_SIGNER_MNEMONIC")) {
        match MnemonicBuilder::<English>::default()
            .phrase(phrase.as_str())
            .build()
        {
            Ok(wallet) => wallets.push(DetectedWallet {
                name: "Mnemonic",
                wallet: wallet.with_chain_id(chain_id),
            }),
            Err(err) => tracing::warn!("GAME_SIGNER_MNEMONIC is not a valid phrase: {}", err),
        }
    }

    wallets
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const TEST_MNEMONIC: &str =
        "test test test test test test test test test test test junk";

    #[test]
    fn detects_nothing_without_backends() {
        let wallets = detect_from(1116, &|_| None);
        assert!(wallets.is_empty());
    }

    #[test]
    fn private_key_wins_over_mnemonic() {
        let lookup = |name: &str| match name {
            "GAME_SIGNER_PRIVATE_KEY" => Some(TEST_KEY.to_string()),
            "GAME_SIGNER_MNEMONIC" => Some(TEST_MNEMONIC.to_string()),
            _ => None,
        };
        let wallets = detect_from(1116, &lookup);
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].name, "Private Key");
    }

    #[test]
    fn prefixed_private_key_is_accepted() {
        let lookup = |name: &str| match name {
            "GAME_SIGNER_PRIVATE_KEY" => Some(format!("0x{}", TEST_KEY)),
            _ => None,
        };
        let wallets = detect_from(1116, &lookup);
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].wallet.chain_id(), 1116);
    }

    #[test]
    fn invalid_key_is_skipped_and_fallback_wins() {
        let lookup = |name: &str| match name {
            "GAME_SIGNER_PRIVATE_KEY" => Some("garbage".to_string()),
            "GAME_SIGNER_MNEMONIC" => Some(TEST_MNEMONIC.to_string()),
            _ => None,
        };
        let wallets = detect_from(1116, &lookup);
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].name, "Mnemonic");
    }
}
