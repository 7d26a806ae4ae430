//! Coin package catalogues and action costs.
//!
//! Packages are the only purchasable units; the catalogues are server-side
//! constants so clients can never negotiate how many coins a payment is
//! worth. Each provider has its own catalogue because the two checkouts are
//! priced in different currencies.

use serde::Serialize;

/// Coins consumed by one post generation.
pub const POST_GENERATION_COST: i64 = 3;

/// Coins consumed by one image generation.
pub const IMAGE_GENERATION_COST: i64 = 5;

/// A purchasable bundle of coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoinPackage {
    /// Stable package identifier used by clients.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Coins credited when a purchase of this package settles.
    pub coins: i64,
    /// Price in the currency's minor unit (cents or paise).
    pub price_minor: i64,
    /// ISO currency code.
    pub currency: &'static str,
    /// Provider-side price identifier, where the provider requires one.
    pub provider_price_id: Option<&'static str>,
    /// Optional marketing badge.
    pub badge: Option<&'static str>,
}

/// Catalogue for the card-checkout provider (USD, prices in cents).
pub const CARD_PACKAGES: [CoinPackage; 3] = [
    CoinPackage {
        id: "100",
        name: "100 Coins",
        coins: 100,
        price_minor: 499,
        currency: "USD",
        provider_price_id: Some("price_1SfIG5EKqulcziPph0w47m85"),
        badge: None,
    },
    CoinPackage {
        id: "500",
        name: "500 Coins",
        coins: 500,
        price_minor: 1999,
        currency: "USD",
        provider_price_id: Some("price_1SfIGAEKqulcziPpaP11W4TC"),
        badge: Some("Popular"),
    },
    CoinPackage {
        id: "1000",
        name: "1000 Coins",
        coins: 1000,
        price_minor: 3499,
        currency: "USD",
        provider_price_id: Some("price_1SfIGFEKqulcziPprT8JTXj9"),
        badge: Some("Best Value"),
    },
];

/// Catalogue for the regional gateway (INR, prices in paise).
pub const GATEWAY_PACKAGES: [CoinPackage; 3] = [
    CoinPackage {
        id: "starter",
        name: "Starter Pack",
        coins: 50,
        price_minor: 19_900,
        currency: "INR",
        provider_price_id: None,
        badge: None,
    },
    CoinPackage {
        id: "pro",
        name: "Pro Pack",
        coins: 150,
        price_minor: 49_900,
        currency: "INR",
        provider_price_id: None,
        badge: None,
    },
    CoinPackage {
        id: "agency",
        name: "Agency Pack",
        coins: 500,
        price_minor: 149_900,
        currency: "INR",
        provider_price_id: None,
        badge: None,
    },
];

/// Look up a card-checkout package by identifier.
#[must_use]
pub fn card_package(id: &str) -> Option<&'static CoinPackage> {
    CARD_PACKAGES.iter().find(|pkg| pkg.id == id)
}

/// Look up a gateway package by identifier.
#[must_use]
pub fn gateway_package(id: &str) -> Option<&'static CoinPackage> {
    GATEWAY_PACKAGES.iter().find(|pkg| pkg.id == id)
}
