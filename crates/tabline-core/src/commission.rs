//! # Commission Rule Resolver
//!
//! Picks the commission rule that applies to a sold item and computes the
//! resulting commission.
//!
//! ## Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Rule Resolution (first match wins)                   │
//! │                                                                         │
//! │   Service line                      Product line                        │
//! │   ────────────                      ────────────                        │
//! │   1. Service  (exact service id)    1. Professional (negotiated rate)   │
//! │   2. Professional                   2. Tenant       (global rate)       │
//! │   3. Unit     (branch)                                                  │
//! │   4. Tenant   (global)                                                  │
//! │                                                                         │
//! │   Within one level the rule with the latest `effective_from` wins.      │
//! │   No match → no commission for that line (the engine logs and skips).   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each level is an independent lookup function. The chains are plain
//! slices of those functions, tried in order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreResult, ValidationError};
use crate::money::{Money, Percentage};
use crate::order::OrderItem;
use crate::types::{new_id, ItemKind};
use crate::validation::{validate_date_range, validate_percentage};

// =============================================================================
// Enums
// =============================================================================

/// The level of the hierarchy a rule is scoped to.
///
/// Stored on every generated `CommissionItem` as its `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionScope {
    Service,
    Professional,
    Unit,
    Tenant,
}

impl CommissionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionScope::Service => "service",
            CommissionScope::Professional => "professional",
            CommissionScope::Unit => "unit",
            CommissionScope::Tenant => "tenant",
        }
    }
}

impl fmt::Display for CommissionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionRateKind {
    /// `rate_value` is in basis points.
    Percentage,
    /// `rate_value` is in cents per unit sold.
    Fixed,
}

/// What the percentage applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CalculationBase {
    /// The line's final price.
    Gross,
    /// The line's final price minus its share of payment fees.
    Net,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Active,
    Canceled,
}

// =============================================================================
// Commission Rule
// =============================================================================

/// A configured commission rate. Read-only during settlement.
///
/// Which of `service_id`, `professional_id` and `unit_id` are meaningful
/// depends on `scope`. A `Service` rule may also carry a `professional_id`
/// to narrow it to one professional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CommissionRule {
    pub id: String,
    pub tenant_id: String,
    pub scope: CommissionScope,
    pub service_id: Option<String>,
    pub professional_id: Option<String>,
    pub unit_id: Option<String>,
    /// Restricts the rule to services or products. `None` matches both.
    pub item_kind: Option<ItemKind>,
    pub rate_kind: CommissionRateKind,
    pub rate_value: i64,
    pub base: CalculationBase,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub is_active: bool,
}

impl CommissionRule {
    /// Checks the rule's own consistency before it is stored.
    pub fn validate(&self) -> CoreResult<()> {
        validate_date_range(self.effective_from, self.effective_until)?;

        match self.rate_kind {
            CommissionRateKind::Percentage => {
                let bps = u32::try_from(self.rate_value).map_err(|_| ValidationError::OutOfRange {
                    field: "rate_value".to_string(),
                    min: 0,
                    max: Percentage::FULL.bps() as i64,
                })?;
                validate_percentage("rate_value", Percentage::from_bps(bps))?;
            }
            CommissionRateKind::Fixed => {
                if self.rate_value < 0 {
                    return Err(ValidationError::MustNotBeNegative {
                        field: "rate_value".to_string(),
                    }
                    .into());
                }
            }
        }

        let missing = match self.scope {
            CommissionScope::Service if self.service_id.is_none() => Some("service_id"),
            CommissionScope::Professional if self.professional_id.is_none() => Some("professional_id"),
            CommissionScope::Unit if self.unit_id.is_none() => Some("unit_id"),
            _ => None,
        };
        if let Some(field) = missing {
            return Err(ValidationError::Required {
                field: field.to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Returns true if `date` falls inside the effective range (inclusive).
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from.map_or(true, |from| from <= date)
            && self.effective_until.map_or(true, |until| date <= until)
    }

    fn applies_to(&self, kind: ItemKind) -> bool {
        self.item_kind.map_or(true, |k| k == kind)
    }

    /// Commission earned on `base_value` for `quantity` units.
    pub fn commission_for(&self, base_value: Money, quantity: i64) -> Money {
        match self.rate_kind {
            CommissionRateKind::Percentage => {
                // validate() keeps rate_value within 0..=10000
                let bps = u32::try_from(self.rate_value).unwrap_or(0);
                base_value.apply_percentage(Percentage::from_bps(bps))
            }
            CommissionRateKind::Fixed => Money::from_cents(self.rate_value).multiply_quantity(quantity),
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Everything the resolver needs to know about the sold line.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub tenant_id: &'a str,
    pub unit_id: Option<&'a str>,
    pub professional_id: &'a str,
    pub catalog_item_id: &'a str,
    pub kind: ItemKind,
    /// The order's business date.
    pub date: NaiveDate,
}

/// The matched rule and the level it matched at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRule<'r> {
    pub rule: &'r CommissionRule,
    pub source: CommissionScope,
}

type Lookup = for<'r> fn(&'r [CommissionRule], &ResolutionContext<'_>) -> Option<&'r CommissionRule>;

const SERVICE_CHAIN: &[(CommissionScope, Lookup)] = &[
    (CommissionScope::Service, by_service),
    (CommissionScope::Professional, by_professional),
    (CommissionScope::Unit, by_unit),
    (CommissionScope::Tenant, by_tenant),
];

const PRODUCT_CHAIN: &[(CommissionScope, Lookup)] = &[
    (CommissionScope::Professional, by_professional),
    (CommissionScope::Tenant, by_tenant),
];

/// Resolves the rule for one sold line.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tabline_core::commission::{resolve_rule, CommissionScope, ResolutionContext};
/// use tabline_core::types::ItemKind;
///
/// let ctx = ResolutionContext {
///     tenant_id: "t",
///     unit_id: None,
///     professional_id: "pro",
///     catalog_item_id: "haircut",
///     kind: ItemKind::Service,
///     date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
/// };
/// assert!(resolve_rule(&[], &ctx).is_none());
/// ```
pub fn resolve_rule<'r>(rules: &'r [CommissionRule], ctx: &ResolutionContext<'_>) -> Option<ResolvedRule<'r>> {
    let chain = match ctx.kind {
        ItemKind::Service => SERVICE_CHAIN,
        ItemKind::Product => PRODUCT_CHAIN,
    };

    chain
        .iter()
        .find_map(|(source, lookup)| lookup(rules, ctx).map(|rule| ResolvedRule { rule, source: *source }))
}

/// Latest-effective candidate at one level.
fn pick<'r>(
    rules: &'r [CommissionRule],
    ctx: &ResolutionContext<'_>,
    scope: CommissionScope,
    matches: impl Fn(&CommissionRule) -> bool,
) -> Option<&'r CommissionRule> {
    rules
        .iter()
        .filter(|r| {
            r.is_active
                && r.scope == scope
                && r.tenant_id == ctx.tenant_id
                && r.applies_to(ctx.kind)
                && r.is_effective_on(ctx.date)
                && matches(r)
        })
        .max_by_key(|r| r.effective_from)
}

fn by_service<'r>(rules: &'r [CommissionRule], ctx: &ResolutionContext<'_>) -> Option<&'r CommissionRule> {
    pick(rules, ctx, CommissionScope::Service, |r| {
        r.service_id.as_deref() == Some(ctx.catalog_item_id)
            && r.professional_id.as_deref().map_or(true, |p| p == ctx.professional_id)
    })
}

fn by_professional<'r>(rules: &'r [CommissionRule], ctx: &ResolutionContext<'_>) -> Option<&'r CommissionRule> {
    pick(rules, ctx, CommissionScope::Professional, |r| {
        r.professional_id.as_deref() == Some(ctx.professional_id)
    })
}

fn by_unit<'r>(rules: &'r [CommissionRule], ctx: &ResolutionContext<'_>) -> Option<&'r CommissionRule> {
    let unit_id = ctx.unit_id?;
    pick(rules, ctx, CommissionScope::Unit, |r| r.unit_id.as_deref() == Some(unit_id))
}

fn by_tenant<'r>(rules: &'r [CommissionRule], ctx: &ResolutionContext<'_>) -> Option<&'r CommissionRule> {
    pick(rules, ctx, CommissionScope::Tenant, |_| true)
}

// =============================================================================
// Commission Item
// =============================================================================

/// A generated commission for one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CommissionItem {
    pub id: String,
    pub tenant_id: String,
    pub professional_id: String,
    pub order_id: String,
    pub order_item_id: String,
    pub rule_id: String,
    pub source: CommissionScope,
    pub base: CalculationBase,
    /// The line's final price.
    pub gross_value: Money,
    /// The value the rate was applied to (gross, or net of fees).
    pub base_value: Money,
    pub rate_kind: CommissionRateKind,
    pub rate_value: i64,
    pub commission_value: Money,
    /// The order's business date, not the settlement date.
    pub reference_date: NaiveDate,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl CommissionItem {
    /// Builds the commission for `item` under `resolved`.
    ///
    /// `fee_share` is the line's share of the order's payment fees; it only
    /// matters for rules with a `Net` base.
    pub fn generate(
        tenant_id: &str,
        professional_id: &str,
        item: &OrderItem,
        resolved: &ResolvedRule<'_>,
        fee_share: Money,
        reference_date: NaiveDate,
    ) -> Self {
        let rule = resolved.rule;
        let gross_value = item.final_price;
        let base_value = match rule.base {
            CalculationBase::Gross => gross_value,
            CalculationBase::Net => (gross_value - fee_share).non_negative(),
        };

        CommissionItem {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            professional_id: professional_id.to_string(),
            order_id: item.order_id.clone(),
            order_item_id: item.id.clone(),
            rule_id: rule.id.clone(),
            source: resolved.source,
            base: rule.base,
            gross_value,
            base_value,
            rate_kind: rule.rate_kind,
            rate_value: rule.rate_value,
            commission_value: rule.commission_for(base_value, item.quantity),
            reference_date,
            status: CommissionStatus::Active,
            created_at: Utc::now(),
            canceled_at: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn rule(id: &str, scope: CommissionScope, bps: i64) -> CommissionRule {
        CommissionRule {
            id: id.to_string(),
            tenant_id: "tenant".to_string(),
            scope,
            service_id: None,
            professional_id: None,
            unit_id: None,
            item_kind: None,
            rate_kind: CommissionRateKind::Percentage,
            rate_value: bps,
            base: CalculationBase::Gross,
            effective_from: None,
            effective_until: None,
            is_active: true,
        }
    }

    fn full_hierarchy() -> Vec<CommissionRule> {
        vec![
            rule("tenant-wide", CommissionScope::Tenant, 3000),
            CommissionRule {
                unit_id: Some("unit-1".to_string()),
                ..rule("unit", CommissionScope::Unit, 3500)
            },
            CommissionRule {
                professional_id: Some("ana".to_string()),
                ..rule("ana", CommissionScope::Professional, 4000)
            },
            CommissionRule {
                service_id: Some("haircut".to_string()),
                ..rule("haircut", CommissionScope::Service, 5000)
            },
        ]
    }

    fn ctx<'a>(kind: ItemKind, item: &'a str, professional: &'a str, unit: Option<&'a str>) -> ResolutionContext<'a> {
        ResolutionContext {
            tenant_id: "tenant",
            unit_id: unit,
            professional_id: professional,
            catalog_item_id: item,
            kind,
            date: date(10),
        }
    }

    #[test]
    fn test_service_hierarchy_order() {
        let rules = full_hierarchy();

        let hit = resolve_rule(&rules, &ctx(ItemKind::Service, "haircut", "ana", Some("unit-1"))).unwrap();
        assert_eq!(hit.source, CommissionScope::Service);

        let hit = resolve_rule(&rules, &ctx(ItemKind::Service, "shave", "ana", Some("unit-1"))).unwrap();
        assert_eq!(hit.source, CommissionScope::Professional);

        let hit = resolve_rule(&rules, &ctx(ItemKind::Service, "shave", "bia", Some("unit-1"))).unwrap();
        assert_eq!(hit.source, CommissionScope::Unit);

        let hit = resolve_rule(&rules, &ctx(ItemKind::Service, "shave", "bia", None)).unwrap();
        assert_eq!(hit.source, CommissionScope::Tenant);
        assert_eq!(hit.rule.id, "tenant-wide");
    }

    #[test]
    fn test_product_skips_service_and_unit_levels() {
        let mut rules = full_hierarchy();
        // A service-scoped rule keyed on the product id must not match a product
        rules.push(CommissionRule {
            service_id: Some("pomade".to_string()),
            ..rule("pomade", CommissionScope::Service, 9000)
        });

        let hit = resolve_rule(&rules, &ctx(ItemKind::Product, "pomade", "bia", Some("unit-1"))).unwrap();
        assert_eq!(hit.source, CommissionScope::Tenant);

        let hit = resolve_rule(&rules, &ctx(ItemKind::Product, "pomade", "ana", Some("unit-1"))).unwrap();
        assert_eq!(hit.source, CommissionScope::Professional);
    }

    #[test]
    fn test_no_rule() {
        let rules = vec![CommissionRule {
            is_active: false,
            ..rule("off", CommissionScope::Tenant, 3000)
        }];
        assert!(resolve_rule(&rules, &ctx(ItemKind::Service, "haircut", "ana", None)).is_none());
    }

    #[test]
    fn test_effective_range_and_latest_wins() {
        let rules = vec![
            CommissionRule {
                effective_from: Some(date(1)),
                ..rule("old", CommissionScope::Tenant, 3000)
            },
            CommissionRule {
                effective_from: Some(date(5)),
                ..rule("new", CommissionScope::Tenant, 3300)
            },
            CommissionRule {
                effective_from: Some(date(20)),
                ..rule("future", CommissionScope::Tenant, 9000)
            },
            CommissionRule {
                effective_until: Some(date(2)),
                ..rule("expired", CommissionScope::Tenant, 9000)
            },
        ];
        let hit = resolve_rule(&rules, &ctx(ItemKind::Service, "haircut", "ana", None)).unwrap();
        assert_eq!(hit.rule.id, "new");
    }

    #[test]
    fn test_item_kind_restriction() {
        let rules = vec![CommissionRule {
            item_kind: Some(ItemKind::Product),
            ..rule("products-only", CommissionScope::Tenant, 1000)
        }];
        assert!(resolve_rule(&rules, &ctx(ItemKind::Service, "haircut", "ana", None)).is_none());
        assert!(resolve_rule(&rules, &ctx(ItemKind::Product, "pomade", "ana", None)).is_some());
    }

    #[test]
    fn test_generate_gross_and_net() {
        let item = OrderItem::new("order", ItemKind::Service, "haircut", Some("ana"), 1, Money::from_cents(8000), Money::zero())
            .unwrap();
        let gross_rule = rule("gross", CommissionScope::Tenant, 5000);
        let resolved = ResolvedRule {
            rule: &gross_rule,
            source: CommissionScope::Tenant,
        };
        let commission = CommissionItem::generate("tenant", "ana", &item, &resolved, Money::from_cents(200), date(10));
        assert_eq!(commission.commission_value.cents(), 4000);
        assert_eq!(commission.base_value.cents(), 8000);

        let net_rule = CommissionRule {
            base: CalculationBase::Net,
            ..rule("net", CommissionScope::Tenant, 5000)
        };
        let resolved = ResolvedRule {
            rule: &net_rule,
            source: CommissionScope::Tenant,
        };
        let commission = CommissionItem::generate("tenant", "ana", &item, &resolved, Money::from_cents(200), date(10));
        assert_eq!(commission.base_value.cents(), 7800);
        assert_eq!(commission.commission_value.cents(), 3900);
        assert_eq!(commission.reference_date, date(10));
        assert_eq!(commission.status, CommissionStatus::Active);
    }

    #[test]
    fn test_fixed_rate_per_unit() {
        let item = OrderItem::new("order", ItemKind::Product, "pomade", Some("ana"), 3, Money::from_cents(2000), Money::zero())
            .unwrap();
        let fixed = CommissionRule {
            rate_kind: CommissionRateKind::Fixed,
            ..rule("fixed", CommissionScope::Tenant, 150)
        };
        let resolved = ResolvedRule {
            rule: &fixed,
            source: CommissionScope::Tenant,
        };
        let commission = CommissionItem::generate("tenant", "ana", &item, &resolved, Money::zero(), date(10));
        assert_eq!(commission.commission_value.cents(), 450);
    }

    #[test]
    fn test_validate_rule() {
        assert!(rule("ok", CommissionScope::Tenant, 3000).validate().is_ok());
        assert!(rule("too-high", CommissionScope::Tenant, 10_001).validate().is_err());
        assert!(rule("negative", CommissionScope::Tenant, -1).validate().is_err());
        assert!(rule("no-service", CommissionScope::Service, 3000).validate().is_err());
        let backwards = CommissionRule {
            effective_from: Some(date(10)),
            effective_until: Some(date(1)),
            ..rule("backwards", CommissionScope::Tenant, 3000)
        };
        assert!(backwards.validate().is_err());
    }
}
