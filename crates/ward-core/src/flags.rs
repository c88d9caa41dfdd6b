//! Permission flags attached to a region.
//!
//! The registry stores flag state; it never interprets or enforces it. Flag
//! names found in persisted data that are not part of [`RegionFlag`] are
//! preserved verbatim so a newer store can round-trip through an older build.

use serde::{Deserialize, Serialize};

/// The fixed set of known permission flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionFlag {
    Place,
    Break,
    Interact,
    Use,
    Pvp,
    Explode,
    MobSpawn,
    MobDamage,
    LeavesDecay,
    Fire,
    LiquidFlow,
    ChestAccess,
    ItemDrop,
    Redstone,
    Heal,
    Invincible,
    Move,
    /// Marks the region as purchasable; carries a price.
    Sell,
}

impl RegionFlag {
    /// All flags in canonical (storage) order.
    pub const ALL: [Self; 18] = [
        Self::Place,
        Self::Break,
        Self::Interact,
        Self::Use,
        Self::Pvp,
        Self::Explode,
        Self::MobSpawn,
        Self::MobDamage,
        Self::LeavesDecay,
        Self::Fire,
        Self::LiquidFlow,
        Self::ChestAccess,
        Self::ItemDrop,
        Self::Redstone,
        Self::Heal,
        Self::Invincible,
        Self::Move,
        Self::Sell,
    ];

    /// Canonical storage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Break => "break",
            Self::Interact => "interact",
            Self::Use => "use",
            Self::Pvp => "pvp",
            Self::Explode => "explode",
            Self::MobSpawn => "mob_spawn",
            Self::MobDamage => "mob_damage",
            Self::LeavesDecay => "leaves_decay",
            Self::Fire => "fire",
            Self::LiquidFlow => "liquid_flow",
            Self::ChestAccess => "chest_access",
            Self::ItemDrop => "item_drop",
            Self::Redstone => "redstone",
            Self::Heal => "heal",
            Self::Invincible => "invincible",
            Self::Move => "move",
            Self::Sell => "sell",
        }
    }

    /// Look up a flag by its canonical storage name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.name() == name)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Current value of one known flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagValue {
    pub state: bool,
    /// Sale price; `-1` whenever no sale is pending. Only meaningful for
    /// [`RegionFlag::Sell`].
    pub price: i64,
}

impl Default for FlagValue {
    fn default() -> Self {
        Self {
            state: false,
            price: -1,
        }
    }
}

/// Raw persisted form of a flag value, keyed by flag name in the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
}

/// Ordered collection of flag values for one region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagSet {
    values: [FlagValue; RegionFlag::ALL.len()],
    /// Flags loaded from the store that this build does not know. Never
    /// interpreted, re-emitted unchanged on save.
    unknown: Vec<(String, FlagRecord)>,
}

impl FlagSet {
    /// A flag set with every flag disabled and no pending sale.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: [FlagValue::default(); RegionFlag::ALL.len()],
            unknown: Vec::new(),
        }
    }

    /// Rebuild a flag set from persisted records, preserving unknown names.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = (String, FlagRecord)>) -> Self {
        let mut set = Self::new();
        for (name, record) in records {
            match RegionFlag::from_name(&name) {
                Some(flag) => {
                    set.values[flag.index()] = FlagValue {
                        state: record.state,
                        price: record.price.unwrap_or(-1),
                    };
                }
                None => set.unknown.push((name, record)),
            }
        }
        set
    }

    /// Persisted form: every known flag in canonical order, then any
    /// preserved unknown flags.
    #[must_use]
    pub fn to_records(&self) -> Vec<(String, FlagRecord)> {
        let mut records: Vec<(String, FlagRecord)> = RegionFlag::ALL
            .into_iter()
            .map(|flag| {
                let value = self.values[flag.index()];
                let price = (flag == RegionFlag::Sell).then_some(value.price);
                (
                    flag.name().to_owned(),
                    FlagRecord {
                        state: value.state,
                        price,
                    },
                )
            })
            .collect();
        records.extend(self.unknown.iter().cloned());
        records
    }

    #[must_use]
    pub fn get(&self, flag: RegionFlag) -> FlagValue {
        self.values[flag.index()]
    }

    pub fn set_state(&mut self, flag: RegionFlag, state: bool) {
        self.values[flag.index()].state = state;
    }

    pub fn set_price(&mut self, flag: RegionFlag, price: i64) {
        self.values[flag.index()].price = price;
    }

    /// Cancel any pending sale: `state = false`, `price = -1`.
    pub fn reset_sell(&mut self) {
        self.values[RegionFlag::Sell.index()] = FlagValue::default();
    }
}

impl Default for FlagSet {
    fn default() -> Self {
        Self::new()
    }
}
