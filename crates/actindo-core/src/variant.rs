//! # Variant Matching
//!
//! Decides, for one article, which hub combinations already exist as
//! storefront details, which must be created and which details are stale.
//!
//! ## Identity
//! Hub groups/values and storefront configurator groups/options live in
//! independent id spaces. They are joined by name (default language) in an
//! [`AttributeMapping`] that is rebuilt for every import and never stored.
//!
//! A combination matches a detail when both its translated group set and
//! its translated option set are equal to the detail's sets. Order does not
//! matter; each detail matches at most once.
//!
//! ```text
//!  hub combination            mapping              storefront detail
//!  ────────────────           ───────              ─────────────────
//!  groups  {10, 11}    ──►    {3, 4}       ==      groups  {4, 3}
//!  values  {100, 110}  ──►    {31, 42}     ==      options {42, 31}    ✓ Keep
//!
//!  values  {100, 999}  ──►    unmapped 999                             ✗ Create
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A configurator group known to the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreGroup {
    pub id: i64,
    pub name: String,
}

/// A configurator option known to the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOption {
    pub id: i64,
    pub group_id: i64,
    pub name: String,
}

// =============================================================================
// Mapping
// =============================================================================

/// Hub id → storefront id, joined by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMapping {
    pub groups: HashMap<i64, i64>,
    pub options: HashMap<i64, i64>,
}

impl AttributeMapping {
    /// Joins hub names against storefront names.
    ///
    /// `hub_groups` is group id → name, `hub_values` is value id →
    /// (group id, name). A value maps only within its mapped group.
    pub fn build(
        hub_groups: &BTreeMap<i64, String>,
        hub_values: &BTreeMap<i64, (i64, String)>,
        groups: &[StoreGroup],
        options: &[StoreOption],
    ) -> Self {
        let mut mapping = AttributeMapping::default();

        for (hub_id, name) in hub_groups {
            if let Some(group) = groups.iter().find(|g| g.name == *name) {
                mapping.groups.insert(*hub_id, group.id);
            }
        }

        for (hub_id, (hub_group, name)) in hub_values {
            let Some(store_group) = mapping.groups.get(hub_group) else {
                continue;
            };
            if let Some(option) = options
                .iter()
                .find(|o| o.group_id == *store_group && o.name == *name)
            {
                mapping.options.insert(*hub_id, option.id);
            }
        }

        mapping
    }

    /// Translates hub group ids; `None` when any id is unmapped.
    pub fn translate_groups(&self, ids: &[i64]) -> Option<BTreeSet<i64>> {
        ids.iter().map(|id| self.groups.get(id).copied()).collect()
    }

    /// Translates hub value ids; `None` when any id is unmapped.
    pub fn translate_options(&self, ids: &[i64]) -> Option<BTreeSet<i64>> {
        ids.iter().map(|id| self.options.get(id).copied()).collect()
    }
}

/// True when two name lists describe the same set.
pub fn same_names<'a>(
    left: impl IntoIterator<Item = &'a str>,
    right: impl IntoIterator<Item = &'a str>,
) -> bool {
    let left: BTreeSet<&str> = left.into_iter().collect();
    let right: BTreeSet<&str> = right.into_iter().collect();
    left == right
}

// =============================================================================
// Plan
// =============================================================================

/// A combination as the hub sends it (hub ids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WantedVariant {
    pub number: String,
    pub group_ids: Vec<i64>,
    pub option_ids: Vec<i64>,
}

/// A detail as the storefront stores it (storefront ids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingVariant {
    pub detail_id: i64,
    pub number: String,
    pub group_ids: BTreeSet<i64>,
    pub option_ids: BTreeSet<i64>,
}

/// What happens to one hub combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantAction {
    /// Set-equal detail found.
    Keep { number: String, detail_id: i64 },
    /// No match, but a detail of this article carries the number; its
    /// options are replaced.
    Adopt { number: String, detail_id: i64 },
    /// No match: create a detail.
    Create { number: String },
}

impl VariantAction {
    pub fn number(&self) -> &str {
        match self {
            VariantAction::Keep { number, .. }
            | VariantAction::Adopt { number, .. }
            | VariantAction::Create { number } => number,
        }
    }
}

/// The reconciliation plan for one article.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantPlan {
    /// One action per hub combination, in hub order.
    pub actions: Vec<VariantAction>,
    /// Details no combination claimed.
    pub stale: Vec<i64>,
}

impl VariantPlan {
    pub fn creates(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, VariantAction::Create { .. }))
            .count()
    }

    pub fn is_noop(&self) -> bool {
        self.stale.is_empty()
            && self
                .actions
                .iter()
                .all(|a| matches!(a, VariantAction::Keep { .. }))
    }
}

/// Matches hub combinations against existing details.
pub fn plan(
    wanted: &[WantedVariant],
    existing: &[ExistingVariant],
    mapping: &AttributeMapping,
) -> VariantPlan {
    let mut claimed: HashSet<i64> = HashSet::new();
    let mut actions = Vec::with_capacity(wanted.len());
    let mut unmatched = Vec::new();

    for (index, combination) in wanted.iter().enumerate() {
        let translated = mapping
            .translate_groups(&combination.group_ids)
            .zip(mapping.translate_options(&combination.option_ids));

        let hit = translated.and_then(|(groups, options)| {
            existing.iter().find(|detail| {
                !claimed.contains(&detail.detail_id)
                    && detail.group_ids == groups
                    && detail.option_ids == options
            })
        });

        match hit {
            Some(detail) => {
                claimed.insert(detail.detail_id);
                actions.push(Some(VariantAction::Keep {
                    number: combination.number.clone(),
                    detail_id: detail.detail_id,
                }));
            }
            None => {
                actions.push(None);
                unmatched.push(index);
            }
        }
    }

    // second pass so a set-equal match is never stolen by a number match
    for index in unmatched {
        let number = &wanted[index].number;
        let same_number = existing
            .iter()
            .find(|d| !claimed.contains(&d.detail_id) && d.number == *number);
        actions[index] = Some(match same_number {
            Some(detail) => {
                claimed.insert(detail.detail_id);
                VariantAction::Adopt {
                    number: number.clone(),
                    detail_id: detail.detail_id,
                }
            }
            None => VariantAction::Create {
                number: number.clone(),
            },
        });
    }

    VariantPlan {
        actions: actions.into_iter().flatten().collect(),
        stale: existing
            .iter()
            .map(|d| d.detail_id)
            .filter(|id| !claimed.contains(id))
            .collect(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> AttributeMapping {
        let hub_groups = BTreeMap::from([(10, "Farbe".to_string()), (11, "Größe".to_string())]);
        let hub_values = BTreeMap::from([
            (100, (10, "Rot".to_string())),
            (101, (10, "Blau".to_string())),
            (110, (11, "M".to_string())),
            (111, (11, "L".to_string())),
        ]);
        let groups = vec![
            StoreGroup { id: 3, name: "Farbe".into() },
            StoreGroup { id: 4, name: "Größe".into() },
        ];
        let options = vec![
            StoreOption { id: 31, group_id: 3, name: "Rot".into() },
            StoreOption { id: 32, group_id: 3, name: "Blau".into() },
            StoreOption { id: 41, group_id: 4, name: "M".into() },
            StoreOption { id: 42, group_id: 4, name: "L".into() },
            // same name in another group must not be picked up
            StoreOption { id: 99, group_id: 7, name: "M".into() },
        ];
        AttributeMapping::build(&hub_groups, &hub_values, &groups, &options)
    }

    fn wanted(number: &str, options: &[i64]) -> WantedVariant {
        WantedVariant {
            number: number.into(),
            group_ids: vec![11, 10],
            option_ids: options.to_vec(),
        }
    }

    fn existing(detail_id: i64, number: &str, options: &[i64]) -> ExistingVariant {
        ExistingVariant {
            detail_id,
            number: number.into(),
            group_ids: BTreeSet::from([3, 4]),
            option_ids: options.iter().copied().collect(),
        }
    }

    #[test]
    fn test_mapping_joins_by_name_within_group() {
        let m = mapping();
        assert_eq!(m.groups[&10], 3);
        assert_eq!(m.options[&110], 41);
        assert_eq!(m.translate_options(&[100, 999]), None);
    }

    #[test]
    fn test_first_import_creates_everything() {
        let plan = plan(
            &[wanted("S-RM", &[100, 110]), wanted("S-BL", &[101, 111])],
            &[],
            &mapping(),
        );
        assert_eq!(plan.creates(), 2);
        assert!(plan.stale.is_empty());
    }

    #[test]
    fn test_matching_is_order_independent_and_idempotent() {
        let details = vec![existing(1, "S-RM", &[41, 31]), existing(2, "S-BL", &[32, 42])];
        let plan = plan(
            &[wanted("S-BL", &[111, 101]), wanted("S-RM", &[110, 100])],
            &details,
            &mapping(),
        );
        assert!(plan.is_noop());
        assert_eq!(
            plan.actions[0],
            VariantAction::Keep { number: "S-BL".into(), detail_id: 2 }
        );
    }

    #[test]
    fn test_unmatched_details_are_stale() {
        let details = vec![existing(1, "S-RM", &[31, 41]), existing(2, "OLD", &[32, 41])];
        let plan = plan(&[wanted("S-RM", &[100, 110])], &details, &mapping());
        assert_eq!(plan.stale, vec![2]);
    }

    #[test]
    fn test_same_number_with_other_options_is_adopted() {
        let details = vec![existing(5, "S-RM", &[32, 42])];
        let plan = plan(&[wanted("S-RM", &[100, 110])], &details, &mapping());
        assert_eq!(
            plan.actions,
            vec![VariantAction::Adopt { number: "S-RM".into(), detail_id: 5 }]
        );
        assert!(plan.stale.is_empty());
    }

    #[test]
    fn test_unmapped_value_forces_creation() {
        let details = vec![existing(1, "X", &[31, 41])];
        let plan = plan(&[wanted("S-NEW", &[100, 999])], &details, &mapping());
        assert_eq!(plan.creates(), 1);
        assert_eq!(plan.stale, vec![1]);
    }

    #[test]
    fn test_same_names_ignores_order() {
        assert!(same_names(["a", "b"], ["b", "a"]));
        assert!(!same_names(["a"], ["a", "b"]));
    }
}
