//! Character stat aggregation.
//!
//! Every stat composes as `base * (1 + modifier) + flat`, with contributions
//! summed per category before composing. Buffs feed modifier and flat
//! contributions; the character profile supplies the base.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Power,
    Haste,
    CritChance,
    CritMultiplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackCategory {
    /// Base contribution (`A`)
    Base,
    /// Multiplicative modifier contribution (`B`)
    Modifier,
    /// Flat additive contribution (`C`)
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: Stat,
    pub category: StackCategory,
    pub value: f64,
}

impl StatModifier {
    pub const fn modifier(stat: Stat, value: f64) -> Self {
        Self {
            stat,
            category: StackCategory::Modifier,
            value,
        }
    }

    pub const fn flat(stat: Stat, value: f64) -> Self {
        Self {
            stat,
            category: StackCategory::Flat,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryTotals {
    pub base: f64,
    pub modifier: f64,
    pub flat: f64,
}

impl CategoryTotals {
    pub fn apply(&mut self, category: StackCategory, value: f64) {
        match category {
            StackCategory::Base => self.base += value,
            StackCategory::Modifier => self.modifier += value,
            StackCategory::Flat => self.flat += value,
        }
    }

    pub fn compose(self) -> f64 {
        self.base * (1.0 + self.modifier) + self.flat
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatSheet {
    totals: BTreeMap<Stat, CategoryTotals>,
}

impl StatSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: &[(Stat, f64)]) -> Self {
        let mut sheet = Self::new();
        for &(stat, value) in base {
            sheet.add(StatModifier {
                stat,
                category: StackCategory::Base,
                value,
            });
        }
        sheet
    }

    pub fn add(&mut self, modifier: StatModifier) {
        self.totals
            .entry(modifier.stat)
            .or_default()
            .apply(modifier.category, modifier.value);
    }

    pub fn add_many<'a, I>(&mut self, modifiers: I)
    where
        I: IntoIterator<Item = &'a StatModifier>,
    {
        for modifier in modifiers {
            self.add(*modifier);
        }
    }

    pub fn totals_for(&self, stat: Stat) -> CategoryTotals {
        self.totals.get(&stat).copied().unwrap_or_default()
    }

    pub fn composed(&self, stat: Stat) -> f64 {
        self.totals_for(stat).compose()
    }

    pub fn power(&self) -> f64 {
        self.composed(Stat::Power).max(0.0)
    }

    /// Divisor applied to skill intervals.
    pub fn haste_multiplier(&self) -> f64 {
        (1.0 + self.composed(Stat::Haste)).max(0.1)
    }

    pub fn crit_chance(&self) -> f64 {
        self.composed(Stat::CritChance).clamp(0.0, 1.0)
    }

    pub fn crit_multiplier(&self) -> f64 {
        self.composed(Stat::CritMultiplier).max(1.0)
    }
}
