//! Cast rendering.
//!
//! Pure string building: given the same event, the produced text and image
//! URL are byte-identical across calls. Addresses render as lowercase hex so
//! the same account never appears under two spellings.

use crate::chain::scanner::LeaderboardEntry;
use crate::chain::{StakeEvent, TransferEvent};
use crate::config::FarcasterConfig;
use alloy::primitives::Address;

/// One outbound Farcaster post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cast {
    pub text: String,
    pub image_url: Option<String>,
}

/// Renders events into casts using the configured image and mini-app URLs.
#[derive(Debug, Clone)]
pub struct Formatter {
    sign_image_url: String,
    sale_image_url: String,
    miniapp_url: String,
}

impl Formatter {
    pub fn from_config(config: &FarcasterConfig) -> Self {
        Self {
            sign_image_url: config.sign_image_url.clone(),
            sale_image_url: config.sale_image_url.clone(),
            miniapp_url: config.miniapp_url.clone(),
        }
    }

    pub fn stake_cast(&self, event: &StakeEvent) -> Cast {
        Cast {
            text: format!(
                "✅ {} just signed #{} ⚡ Base Mainnet",
                lowercase_hex(&event.user),
                event.token_id
            ),
            image_url: Some(self.sign_image_url.clone()),
        }
    }

    pub fn transfer_cast(&self, event: &TransferEvent) -> Cast {
        Cast {
            text: format!(
                "💸 VRNouns #{} transferred to {} ⚡ Base Mainnet",
                event.token_id,
                lowercase_hex(&event.to)
            ),
            image_url: Some(self.sale_image_url.clone()),
        }
    }

    pub fn daily_report(&self, signer_count: usize) -> Cast {
        Cast {
            text: format!(
                "📊 Daily VRNouns Report\n👥 {} signers today\n⚡ Base Mainnet",
                signer_count
            ),
            image_url: Some(self.sign_image_url.clone()),
        }
    }

    pub fn leaderboard_cast(&self, entries: &[LeaderboardEntry]) -> Cast {
        let mut lines = Vec::with_capacity(entries.len() + 2);
        lines.push("🏆 VRNouns Top Stakers:".to_string());
        for (i, entry) in entries.iter().enumerate() {
            lines.push(format!(
                "{}. {} — {} stake(s)",
                i + 1,
                short_addr(&entry.address),
                entry.count
            ));
        }
        lines.push(self.miniapp_url.clone());
        Cast {
            text: lines.join("\n"),
            image_url: None,
        }
    }
}

fn lowercase_hex(addr: &Address) -> String {
    addr.to_string().to_lowercase()
}

/// `0x1234...abcd` shorthand for leaderboard rows.
fn short_addr(addr: &Address) -> String {
    let hex = lowercase_hex(addr);
    format!("{}...{}", &hex[..6], &hex[hex.len() - 4..])
}
