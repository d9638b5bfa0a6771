//! Traversal abilities derived from cumulative item pickups.
//!
//! Every ability unlocks at the row index where one of its items was picked
//! up (the Nth time for progressive items). Items are never lost, so each
//! flag is monotonic over a run.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

use crate::constants::ITEM_NEVER_FOUND;
use crate::error::RouteError;
use crate::runlog::LogRow;

/// Items that take part in ability rules, keyed by their logged item id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Sword,
    Hammer,
    Lantern,
    FireRod,
    IceRod,
    Boots,
    Glove,
    Mirror,
    Bow,
    Hookshot,
    Byrna,
    Cape,
    MoonPearl,
    Bombos,
    Flippers,
}

impl Item {
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::Sword => 27,
            Self::Hammer => 13,
            Self::Lantern => 12,
            Self::FireRod => 7,
            Self::IceRod => 8,
            Self::Boots => 23,
            Self::Glove => 24,
            Self::Mirror => 22,
            Self::Bow => 0,
            Self::Hookshot => 4,
            Self::Byrna => 21,
            Self::Cape => 52,
            Self::MoonPearl => 26,
            Self::Bombos => 9,
            Self::Flippers => 25,
        }
    }
}

/// One way of unlocking an ability: the `level`th pickup of `item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unlock {
    pub item: Item,
    pub level: usize,
}

/// Every known traversal ability.
///
/// The declaration order is alphabetical by name, which is also the
/// canonical order abilities are hashed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    #[serde(rename = "can_burn_things")]
    BurnThings,
    #[serde(rename = "can_dash")]
    Dash,
    #[serde(rename = "can_hammer")]
    Hammer,
    #[serde(rename = "can_lift_heavy_rocks")]
    LiftHeavyRocks,
    #[serde(rename = "can_lift_rocks")]
    LiftRocks,
    #[serde(rename = "can_light_things")]
    LightThings,
    #[serde(rename = "can_melt_things")]
    MeltThings,
    #[serde(rename = "can_pass_energy_barriers")]
    PassEnergyBarriers,
    #[serde(rename = "can_remain_link_in_dw")]
    RemainLinkInDarkWorld,
    #[serde(rename = "can_shoot")]
    Shoot,
    #[serde(rename = "can_slash")]
    Slash,
    #[serde(rename = "can_swim")]
    Swim,
    #[serde(rename = "can_traverse_big_gaps")]
    TraverseBigGaps,
}

impl Ability {
    pub const ALL: [Self; 13] = [
        Self::Slash,
        Self::Hammer,
        Self::Dash,
        Self::Shoot,
        Self::LiftRocks,
        Self::LiftHeavyRocks,
        Self::RemainLinkInDarkWorld,
        Self::BurnThings,
        Self::MeltThings,
        Self::LightThings,
        Self::TraverseBigGaps,
        Self::Swim,
        Self::PassEnergyBarriers,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Slash => "can_slash",
            Self::Hammer => "can_hammer",
            Self::Dash => "can_dash",
            Self::Shoot => "can_shoot",
            Self::LiftRocks => "can_lift_rocks",
            Self::LiftHeavyRocks => "can_lift_heavy_rocks",
            Self::RemainLinkInDarkWorld => "can_remain_link_in_dw",
            Self::BurnThings => "can_burn_things",
            Self::MeltThings => "can_melt_things",
            Self::LightThings => "can_light_things",
            Self::TraverseBigGaps => "can_traverse_big_gaps",
            Self::Swim => "can_swim",
            Self::PassEnergyBarriers => "can_pass_energy_barriers",
        }
    }

    /// Alternative unlocks; the ability is active from the earliest one.
    #[must_use]
    pub const fn unlocks(self) -> &'static [Unlock] {
        match self {
            Self::Slash => &[Unlock { item: Item::Sword, level: 1 }],
            Self::Hammer => &[Unlock { item: Item::Hammer, level: 1 }],
            Self::Dash => &[Unlock { item: Item::Boots, level: 1 }],
            Self::Shoot => &[Unlock { item: Item::Bow, level: 1 }],
            Self::LiftRocks => &[Unlock { item: Item::Glove, level: 1 }],
            Self::LiftHeavyRocks => &[Unlock { item: Item::Glove, level: 2 }],
            Self::RemainLinkInDarkWorld => &[Unlock { item: Item::MoonPearl, level: 1 }],
            Self::BurnThings => &[Unlock { item: Item::FireRod, level: 1 }],
            Self::MeltThings => &[
                Unlock { item: Item::FireRod, level: 1 },
                Unlock { item: Item::Bombos, level: 1 },
            ],
            Self::LightThings => &[
                Unlock { item: Item::FireRod, level: 1 },
                Unlock { item: Item::Lantern, level: 1 },
            ],
            Self::TraverseBigGaps => &[Unlock { item: Item::Hookshot, level: 1 }],
            Self::Swim => &[Unlock { item: Item::Flippers, level: 1 }],
            Self::PassEnergyBarriers => &[
                Unlock { item: Item::Sword, level: 2 },
                Unlock { item: Item::Byrna, level: 1 },
                Unlock { item: Item::Cape, level: 1 },
            ],
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Ability {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.name() == trimmed || a.name().trim_start_matches("can_") == trimmed)
            .ok_or_else(|| RouteError::UnknownAbility(trimmed.to_string()))
    }
}

/// The ordered set of abilities evaluated for every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityRules {
    abilities: Vec<Ability>,
}

impl Default for AbilityRules {
    fn default() -> Self {
        Self::graph_default()
    }
}

impl AbilityRules {
    /// Every known ability, in rule-table order.
    #[must_use]
    pub fn all() -> Self {
        Self {
            abilities: Ability::ALL.to_vec(),
        }
    }

    /// The subset used for logic-tile identities by default: the abilities
    /// that change which transitions are possible most often.
    #[must_use]
    pub fn graph_default() -> Self {
        Self {
            abilities: vec![
                Ability::Slash,
                Ability::Dash,
                Ability::LiftHeavyRocks,
                Ability::RemainLinkInDarkWorld,
                Ability::TraverseBigGaps,
            ],
        }
    }

    /// An explicit subset in the given order. Duplicates are dropped.
    #[must_use]
    pub fn subset(abilities: &[Ability]) -> Self {
        let mut picked: Vec<Ability> = Vec::with_capacity(abilities.len());
        for ability in abilities {
            if !picked.contains(ability) {
                picked.push(*ability);
            }
        }
        Self { abilities: picked }
    }

    /// Parse names such as `can_dash` or `dash`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownAbility`] for a name not in the rule table.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, RouteError> {
        let parsed = names
            .iter()
            .map(|n| n.as_ref().parse::<Ability>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::subset(&parsed))
    }

    #[must_use]
    pub fn abilities(&self) -> &[Ability] {
        &self.abilities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    /// Compute the ability vector of every row of a run.
    #[must_use]
    pub fn evaluate(&self, rows: &[LogRow]) -> Vec<AbilityVector> {
        let unlock_at: SmallVec<[(Ability, usize); 16]> = self
            .abilities
            .iter()
            .map(|a| (*a, unlock_index(rows, *a)))
            .collect();
        for (ability, idx) in &unlock_at {
            if *idx != ITEM_NEVER_FOUND {
                log::trace!("{ability} unlocked at row {idx}");
            }
        }
        rows.iter()
            .map(|row| AbilityVector {
                flags: unlock_at
                    .iter()
                    .map(|(ability, idx)| (*ability, row.index >= *idx))
                    .collect(),
            })
            .collect()
    }
}

/// Row index of the `level`th pickup of `item`, or [`ITEM_NEVER_FOUND`].
#[must_use]
pub fn item_log_index(rows: &[LogRow], item: Item, level: usize) -> usize {
    if level == 0 {
        return 0;
    }
    rows.iter()
        .filter(|r| r.item_id == Some(item.id()))
        .nth(level - 1)
        .map_or(ITEM_NEVER_FOUND, |r| r.index)
}

/// Earliest row index at which `ability` becomes available.
#[must_use]
pub fn unlock_index(rows: &[LogRow], ability: Ability) -> usize {
    ability
        .unlocks()
        .iter()
        .map(|u| item_log_index(rows, u.item, u.level))
        .min()
        .unwrap_or(ITEM_NEVER_FOUND)
}

/// Boolean ability flags in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AbilityVector {
    flags: SmallVec<[(Ability, bool); 16]>,
}

impl AbilityVector {
    #[must_use]
    pub fn from_flags(flags: &[(Ability, bool)]) -> Self {
        Self {
            flags: flags.iter().copied().collect(),
        }
    }

    #[must_use]
    pub fn get(&self, ability: Ability) -> Option<bool> {
        self.flags
            .iter()
            .find(|(a, _)| *a == ability)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ability, bool)> + '_ {
        self.flags.iter().copied()
    }

    pub fn abilities(&self) -> impl Iterator<Item = Ability> + '_ {
        self.flags.iter().map(|(a, _)| *a)
    }

    pub fn active(&self) -> impl Iterator<Item = Ability> + '_ {
        self.flags.iter().filter(|(_, on)| *on).map(|(a, _)| *a)
    }

    /// Comma-separated names of the active abilities.
    #[must_use]
    pub fn describe(&self) -> String {
        self.active().map(Ability::name).collect::<Vec<_>>().join(", ")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, item: Item) -> LogRow {
        LogRow {
            index,
            timestamp: index as u64 * 100,
            item_id: Some(item.id()),
            ..LogRow::default()
        }
    }

    fn tile(index: usize, tile_id: u32) -> LogRow {
        LogRow::tile(index, index as u64 * 100, tile_id)
    }

    #[test]
    fn ability_names_round_trip() {
        for ability in Ability::ALL {
            assert_eq!(ability.name().parse::<Ability>().unwrap(), ability);
        }
        assert_eq!("dash".parse::<Ability>().unwrap(), Ability::Dash);
        assert!("can_fly".parse::<Ability>().is_err());
    }

    #[test]
    fn flags_turn_on_at_pickup_row() {
        let rows = vec![tile(0, 1), item(1, Item::Boots), tile(2, 2)];
        let rules = AbilityRules::subset(&[Ability::Dash, Ability::Slash]);
        let vectors = rules.evaluate(&rows);
        let dash: Vec<bool> = vectors.iter().map(|v| v.get(Ability::Dash).unwrap()).collect();
        assert_eq!(dash, vec![false, true, true]);
        assert!(vectors.iter().all(|v| v.get(Ability::Slash) == Some(false)));
        assert_eq!(vectors[2].describe(), "can_dash");
    }

    #[test]
    fn progressive_items_need_nth_pickup() {
        let rows = vec![tile(0, 1), item(1, Item::Glove), tile(2, 2), item(3, Item::Glove)];
        let vectors = AbilityRules::all().evaluate(&rows);
        let light: Vec<bool> = vectors.iter().map(|v| v.get(Ability::LiftRocks).unwrap()).collect();
        let heavy: Vec<bool> = vectors
            .iter()
            .map(|v| v.get(Ability::LiftHeavyRocks).unwrap())
            .collect();
        assert_eq!(light, vec![false, true, true, true]);
        assert_eq!(heavy, vec![false, false, false, true]);
    }

    #[test]
    fn alternatives_take_the_earliest_unlock() {
        let rows = vec![item(0, Item::Lantern), tile(1, 2), item(2, Item::FireRod)];
        assert_eq!(unlock_index(&rows, Ability::LightThings), 0);
        assert_eq!(unlock_index(&rows, Ability::MeltThings), 2);
        assert_eq!(unlock_index(&rows, Ability::Swim), ITEM_NEVER_FOUND);
    }

    #[test]
    fn unlock_table_lists_alternatives() {
        assert_eq!(
            Ability::LiftHeavyRocks.unlocks(),
            &[Unlock { item: Item::Glove, level: 2 }]
        );
        let barriers: Vec<(Item, usize)> = Ability::PassEnergyBarriers
            .unlocks()
            .iter()
            .map(|u| (u.item, u.level))
            .collect();
        assert_eq!(
            barriers,
            vec![(Item::Sword, 2), (Item::Byrna, 1), (Item::Cape, 1)]
        );
        assert!(Ability::ALL.iter().all(|a| !a.unlocks().is_empty()));
    }

    #[test]
    fn bow_has_item_id_zero() {
        let rows = vec![tile(0, 4), item(1, Item::Bow)];
        assert_eq!(unlock_index(&rows, Ability::Shoot), 1);
    }

    #[test]
    fn explicit_subset_keeps_order_and_drops_duplicates() {
        let rules = AbilityRules::from_names(&["swim", "can_dash", "swim"]).unwrap();
        assert_eq!(rules.abilities(), &[Ability::Swim, Ability::Dash]);
        let vector = &rules.evaluate(&[tile(0, 1)])[0];
        let order: Vec<Ability> = vector.abilities().collect();
        assert_eq!(order, vec![Ability::Swim, Ability::Dash]);
    }
}
