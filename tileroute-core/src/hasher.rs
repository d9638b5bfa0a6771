//! Order-independent hashing of selected record fields.
//!
//! Records expose their values through [`HashRecord`]; the caller names the
//! fields to include. Fields are sorted into a canonical order before they
//! are fed to the hasher, and every value is framed with a type tag and a
//! length so adjacent values can never run together.
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

use smallvec::SmallVec;
use twox_hash::XxHash64;

use crate::ability::Ability;
use crate::constants::ROW_HASH_SEED;
use crate::error::RouteError;

/// A hashable field of a tile visit.
///
/// The derived ordering is the canonical hashing order; abilities sort by
/// name after the fixed slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    PreviousTile,
    TileId,
    NextTile,
    NextNextTile,
    LocationIds,
    ItemIds,
    EventIds,
    Ability(Ability),
}

impl Field {
    /// The sliding window that identifies a logic tile.
    pub const WINDOW: [Self; 3] = [Self::PreviousTile, Self::TileId, Self::NextTile];
    /// The full route context used by the best-time estimator.
    pub const ROUTE: [Self; 4] = [
        Self::PreviousTile,
        Self::TileId,
        Self::NextTile,
        Self::NextNextTile,
    ];
    /// Incidental events aggregated on a visit.
    pub const TILE_EVENTS: [Self; 3] = [Self::LocationIds, Self::ItemIds, Self::EventIds];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreviousTile => "previous_tile",
            Self::TileId => "tile_id",
            Self::NextTile => "next_tile",
            Self::NextNextTile => "next_next_tile",
            Self::LocationIds => "location_id",
            Self::ItemIds => "item_id",
            Self::EventIds => "event_id",
            Self::Ability(ability) => ability.name(),
        }
    }

    const fn tag(self) -> u8 {
        match self {
            Self::PreviousTile => 1,
            Self::TileId => 2,
            Self::NextTile => 3,
            Self::NextNextTile => 4,
            Self::LocationIds => 5,
            Self::ItemIds => 6,
            Self::EventIds => 7,
            Self::Ability(_) => 8,
        }
    }

    /// `WINDOW` followed by one field per ability, in the given order.
    pub fn window_with(abilities: impl IntoIterator<Item = Ability>) -> Vec<Self> {
        Self::WINDOW
            .into_iter()
            .chain(abilities.into_iter().map(Self::Ability))
            .collect()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let field = match trimmed {
            "previous_tile" => Self::PreviousTile,
            "tile_id" => Self::TileId,
            "next_tile" => Self::NextTile,
            "next_next_tile" => Self::NextNextTile,
            "location_id" | "location_ids" => Self::LocationIds,
            "item_id" | "item_ids" => Self::ItemIds,
            "event_id" | "event_ids" => Self::EventIds,
            other => Self::Ability(other.parse()?),
        };
        Ok(field)
    }
}

/// A borrowed field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Missing,
    Int(u64),
    Bool(bool),
    List(&'a [u32]),
}

/// Anything that can hand out values for [`Field`]s.
pub trait HashRecord {
    fn field_value(&self, field: Field) -> FieldValue<'_>;
}

/// Hash the values of `fields` on `record`.
///
/// The order of `fields` does not matter and repeated fields count once.
#[must_use]
pub fn hash_fields<R: HashRecord + ?Sized>(record: &R, fields: &[Field]) -> u64 {
    let mut canonical: SmallVec<[Field; 24]> = fields.iter().copied().collect();
    canonical.sort_unstable();
    canonical.dedup();

    let mut hasher = XxHash64::with_seed(ROW_HASH_SEED);
    hasher.write(&(canonical.len() as u64).to_le_bytes());
    for field in canonical {
        hasher.write(&[field.tag()]);
        if let Field::Ability(ability) = field {
            write_framed(&mut hasher, ability.name().as_bytes());
        }
        match record.field_value(field) {
            FieldValue::Missing => hasher.write(&[0]),
            FieldValue::Int(value) => {
                hasher.write(&[1]);
                hasher.write(&value.to_le_bytes());
            }
            FieldValue::Bool(value) => hasher.write(&[2, u8::from(value)]),
            FieldValue::List(values) => {
                hasher.write(&[3]);
                write_framed(&mut hasher, join_ids(values).as_bytes());
            }
        }
    }
    hasher.finish()
}

fn write_framed(hasher: &mut XxHash64, bytes: &[u8]) {
    hasher.write(&(bytes.len() as u64).to_le_bytes());
    hasher.write(bytes);
}

/// Order-preserving comma-joined rendering of an id list.
#[must_use]
pub fn join_ids(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
