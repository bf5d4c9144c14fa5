//! Swap execution client: route resolution, local signing, and submission.
//!
//! The router resolves the best route for a swap and returns an unsigned
//! transaction, which is signed locally with the bot's keypair and sent
//! back for submission. Requests carry a short timeout; a timed-out call
//! surfaces as a failed trade to the orchestrator.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info};

use super::types::{SubmitResponse, SwapRouteResponse};

const ROUTER_API_BASE: &str = "https://gmgn.ai/defi/router/v1/sol";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the swap router, owning the signing keypair.
pub struct SwapClient {
    http: Client,
    base_url: String,
    keypair: Keypair,
}

impl SwapClient {
    /// Create a client around an already loaded keypair.
    pub fn new(keypair: Keypair) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: ROUTER_API_BASE.to_string(),
            keypair,
        })
    }

    /// Load the keypair from the `WALLET_PRIVATE_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("WALLET_PRIVATE_KEY")
            .context("WALLET_PRIVATE_KEY not set in environment")?;
        Self::new(decode_secret(&secret)?)
    }

    /// Create with a custom router URL (for testing).
    pub fn with_base_url(keypair: Keypair, base_url: String) -> Result<Self> {
        let mut client = Self::new(keypair)?;
        client.base_url = base_url;
        Ok(client)
    }

    /// Public key the swaps originate from.
    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Ask the router for the best route and its unsigned transaction.
    pub async fn resolve_swap_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount_base_units: u64,
        slippage_percent: f64,
    ) -> Result<SwapRouteResponse> {
        let url = format!(
            "{}/tx/get_swap_route?token_in_address={}&token_out_address={}&in_amount={}&from_address={}&slippage={}",
            self.base_url,
            token_in,
            token_out,
            amount_base_units,
            self.keypair.pubkey(),
            slippage_percent
        );

        debug!(url = %url, "Resolving swap route");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch swap route")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Swap route request failed: {} - {}", status, body);
        }

        let route: SwapRouteResponse = response
            .json()
            .await
            .context("Failed to parse swap route response")?;

        if route.code != 0 {
            bail!("Router rejected the swap: {} ({})", route.msg, route.code);
        }

        Ok(route)
    }

    /// Sign a hex-encoded unsigned transaction from the router.
    pub fn sign_transaction(&self, raw_tx_hex: &str) -> Result<String> {
        let bytes = hex::decode(raw_tx_hex).context("Router returned invalid hex transaction")?;
        let unsigned: VersionedTransaction =
            bincode::deserialize(&bytes).context("Failed to decode swap transaction")?;

        let signed = VersionedTransaction::try_new(unsigned.message, &[&self.keypair])
            .context("Failed to sign swap transaction")?;

        let encoded = bincode::serialize(&signed).context("Failed to encode signed transaction")?;
        Ok(hex::encode(encoded))
    }

    /// Submit a signed transaction through the router.
    pub async fn submit_signed_transaction(&self, signed_tx: &str) -> Result<SubmitResponse> {
        let url = format!("{}/tx/submit_signed_transaction", self.base_url);
        let payload = serde_json::json!({ "signed_tx": signed_tx });

        debug!(url = %url, "Submitting signed transaction");

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to submit signed transaction")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Transaction submission failed: {} - {}", status, body);
        }

        let result: SubmitResponse = response
            .json()
            .await
            .context("Failed to parse submission response")?;

        if result.code != 0 {
            bail!("Submission rejected: {} ({})", result.msg, result.code);
        }

        Ok(result)
    }

    /// Full execution flow: route, sign, submit. Returns the tx hash.
    pub async fn execute_swap(
        &self,
        token_in: &str,
        token_out: &str,
        amount_base_units: u64,
        slippage_percent: f64,
    ) -> Result<String> {
        info!(
            token_in = %token_in,
            token_out = %token_out,
            amount = amount_base_units,
            "Executing swap"
        );

        let route = self
            .resolve_swap_route(token_in, token_out, amount_base_units, slippage_percent)
            .await?;
        let signed = self.sign_transaction(&route.data.raw_tx.swap_transaction)?;
        let result = self.submit_signed_transaction(&signed).await?;

        let hash = result.data.map(|d| d.hash).unwrap_or_default();
        info!(hash = %hash, "Swap submitted");
        Ok(hash)
    }
}

/// Decode a wallet secret, accepting base64 (our .env convention) or the
/// base58 export format most Solana wallets use.
fn decode_secret(secret: &str) -> Result<Keypair> {
    let trimmed = secret.trim();
    let bytes = match BASE64.decode(trimmed) {
        Ok(bytes) => bytes,
        Err(_) => bs58::decode(trimmed)
            .into_vec()
            .context("Wallet key is neither valid base64 nor base58")?,
    };

    Keypair::from_bytes(&bytes).map_err(|e| anyhow!("Invalid wallet keypair: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::message::Message;
    use solana_sdk::transaction::Transaction;

    #[test]
    fn test_decode_secret_base64() {
        let keypair = Keypair::new();
        let secret = BASE64.encode(keypair.to_bytes());

        let decoded = decode_secret(&secret).unwrap();
        assert_eq!(decoded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_decode_secret_base58() {
        let keypair = Keypair::new();
        let secret = bs58::encode(keypair.to_bytes()).into_string();

        let decoded = decode_secret(&secret).unwrap();
        assert_eq!(decoded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_decode_secret_garbage() {
        assert!(decode_secret("!!not-a-key!!").is_err());
    }

    #[test]
    fn test_sign_transaction_round_trip() {
        let keypair = Keypair::new();
        let message = Message::new(&[], Some(&keypair.pubkey()));
        let unsigned = VersionedTransaction::from(Transaction::new_unsigned(message));
        let raw_hex = hex::encode(bincode::serialize(&unsigned).unwrap());

        let client = SwapClient::new(keypair).unwrap();
        let signed_hex = client.sign_transaction(&raw_hex).unwrap();

        let signed: VersionedTransaction =
            bincode::deserialize(&hex::decode(signed_hex).unwrap()).unwrap();
        assert_eq!(signed.signatures.len(), 1);
        assert!(signed.signatures[0].verify(
            client.address().as_ref(),
            &signed.message.serialize()
        ));
    }

    #[test]
    fn test_sign_transaction_rejects_bad_hex() {
        let client = SwapClient::new(Keypair::new()).unwrap();
        assert!(client.sign_transaction("zzzz").is_err());
    }
}
