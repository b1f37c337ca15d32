//! # Settlement Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TABLINE_TENANT_ID=...                                              │
//! │     TABLINE_NEGATIVE_STOCK_POLICY=reject                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tabline/settlement.toml (Linux)                          │
//! │     ~/Library/Application Support/com.tabline.tabline/settlement.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     tolerance 0.01, debt due in 30 days, divergence 5.00, allow        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [tenant]
//! id = "00000000-0000-0000-0000-000000000001"
//!
//! [close]
//! tolerance_cents = 1
//! debt_due_days = 30
//!
//! [cash_register]
//! divergence_threshold_cents = 500
//!
//! [stock]
//! negative_stock_policy = "allow"  # allow | reject
//!
//! [database]
//! path = "tabline.db"
//! max_connections = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use tabline_core::{Money, DEFAULT_CLOSE_TOLERANCE, DEFAULT_DEBT_DUE_DAYS, DEFAULT_DIVERGENCE_THRESHOLD, DEFAULT_TENANT_ID};
use tabline_db::DbConfig;

use crate::error::{SettlementError, SettlementResult};

// =============================================================================
// Negative Stock Policy
// =============================================================================

/// What a close does when a sale would take a product below zero.
///
/// ```text
/// ALLOW (default)   the movement is recorded, on-hand goes negative,
///                   a warning is logged; the customer is never blocked
///
/// REJECT            the close is refused with InsufficientStock before
///                   any ledger is touched
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeStockPolicy {
    #[default]
    Allow,
    Reject,
}

impl std::fmt::Display for NegativeStockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NegativeStockPolicy::Allow => write!(f, "allow"),
            NegativeStockPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for NegativeStockPolicy {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" | "warn" => Ok(NegativeStockPolicy::Allow),
            "reject" | "block" => Ok(NegativeStockPolicy::Reject),
            other => Err(SettlementError::Config(format!(
                "Unknown negative stock policy: '{}'. Valid options: allow, reject",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default = "default_tenant_id")]
    pub id: String,
}

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

impl Default for TenantSettings {
    fn default() -> Self {
        TenantSettings {
            id: default_tenant_id(),
        }
    }
}

/// Order close settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSettings {
    /// Largest payment/item difference still treated as "paid in full".
    #[serde(default = "default_tolerance")]
    pub tolerance_cents: i64,

    /// Due date offset of the receivable created for a balance left as debt.
    #[serde(default = "default_debt_due_days")]
    pub debt_due_days: i64,
}

fn default_tolerance() -> i64 {
    DEFAULT_CLOSE_TOLERANCE.cents()
}

fn default_debt_due_days() -> i64 {
    DEFAULT_DEBT_DUE_DAYS
}

impl Default for CloseSettings {
    fn default() -> Self {
        CloseSettings {
            tolerance_cents: default_tolerance(),
            debt_due_days: default_debt_due_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashRegisterSettings {
    /// Divergence above which closing the register needs a justification.
    #[serde(default = "default_divergence_threshold")]
    pub divergence_threshold_cents: i64,
}

fn default_divergence_threshold() -> i64 {
    DEFAULT_DIVERGENCE_THRESHOLD.cents()
}

impl Default for CashRegisterSettings {
    fn default() -> Self {
        CashRegisterSettings {
            divergence_threshold_cents: default_divergence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockSettings {
    #[serde(default)]
    pub negative_stock_policy: NegativeStockPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tabline.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Settlement Configuration
// =============================================================================

/// Complete settlement configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementConfig {
    #[serde(default)]
    pub tenant: TenantSettings,

    #[serde(default)]
    pub close: CloseSettings,

    #[serde(default)]
    pub cash_register: CashRegisterSettings,

    #[serde(default)]
    pub stock: StockSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl SettlementConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (settlement.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SettlementResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading settlement config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load settlement config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SettlementResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SettlementError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Settlement config saved");
        Ok(())
    }

    pub fn validate(&self) -> SettlementResult<()> {
        if self.tenant.id.trim().is_empty() {
            return Err(SettlementError::Config("tenant.id must not be empty".into()));
        }
        if self.close.tolerance_cents < 0 {
            return Err(SettlementError::Config("close.tolerance_cents must not be negative".into()));
        }
        if self.close.debt_due_days < 0 {
            return Err(SettlementError::Config("close.debt_due_days must not be negative".into()));
        }
        if self.cash_register.divergence_threshold_cents < 0 {
            return Err(SettlementError::Config(
                "cash_register.divergence_threshold_cents must not be negative".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(SettlementError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TABLINE_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("TABLINE_TENANT_ID") {
            debug!(tenant_id = %id, "Overriding tenant from environment");
            self.tenant.id = id;
        }

        if let Some(value) = lookup("TABLINE_CLOSE_TOLERANCE_CENTS") {
            match value.parse::<i64>() {
                Ok(cents) => self.close.tolerance_cents = cents,
                Err(_) => warn!(value = %value, "Ignoring invalid TABLINE_CLOSE_TOLERANCE_CENTS"),
            }
        }

        if let Some(value) = lookup("TABLINE_DIVERGENCE_THRESHOLD_CENTS") {
            match value.parse::<i64>() {
                Ok(cents) => self.cash_register.divergence_threshold_cents = cents,
                Err(_) => warn!(value = %value, "Ignoring invalid TABLINE_DIVERGENCE_THRESHOLD_CENTS"),
            }
        }

        if let Some(value) = lookup("TABLINE_NEGATIVE_STOCK_POLICY") {
            match value.parse() {
                Ok(policy) => {
                    debug!(policy = %policy, "Overriding negative stock policy from environment");
                    self.stock.negative_stock_policy = policy;
                }
                Err(_) => warn!(value = %value, "Unknown negative stock policy in environment"),
            }
        }

        if let Some(path) = lookup("TABLINE_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tabline", "tabline")
            .map(|dirs| dirs.config_dir().join("settlement.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tenant_id(&self) -> &str {
        &self.tenant.id
    }

    pub fn close_tolerance(&self) -> Money {
        Money::from_cents(self.close.tolerance_cents)
    }

    pub fn divergence_threshold(&self) -> Money {
        Money::from_cents(self.cash_register.divergence_threshold_cents)
    }

    pub fn negative_stock_policy(&self) -> NegativeStockPolicy {
        self.stock.negative_stock_policy
    }

    /// Pool configuration for the configured database file.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }
}
