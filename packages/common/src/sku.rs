//! Canonical item identity ("SKU").
//!
//! The string grammar is shared with downstream consumers and must stay
//! byte-compatible with the `tf2-sku` format:
//!
//! ```text
//! {defindex};{quality}[;u{effect}][;australium][;uncraftable][;w{wear}][;pk{paintkit}]
//!     [;strange][;kt-{killstreak}][;td-{target}][;festive][;c{crateseries}]
//!     [;od-{output}][;oq-{outputQuality}]
//! ```

use std::fmt;

use crate::item::Item;

/// Unusualifier: its price index is the target defindex.
const UNUSUALIFIER_DEFINDEX: i32 = 9258;
/// Specialized Killstreak Kit Fabricator.
const SPECIALIZED_FABRICATOR_DEFINDEX: i32 = 20002;
/// Professional Killstreak Kit Fabricator.
const PROFESSIONAL_FABRICATOR_DEFINDEX: i32 = 20003;

/// Attributes that make up an item's identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SkuAttributes {
    pub defindex: i32,
    pub quality: i32,
    pub craftable: bool,
    pub killstreak: i32,
    pub australium: bool,
    pub festive: bool,
    pub effect: Option<i32>,
    pub paintkit: Option<i32>,
    pub wear: Option<i32>,
    pub quality2: Option<i32>,
    pub crateseries: Option<i32>,
    pub target: Option<i64>,
    pub output: Option<i32>,
    pub output_quality: Option<i32>,
}

impl SkuAttributes {
    /// Extract the identity attributes from a feed item.
    ///
    /// Returns `None` when the item has no quality.
    pub fn from_item(item: &Item) -> Option<Self> {
        let quality = item.quality.as_ref()?.id;
        let output_item = item.recipe.as_ref().and_then(|r| r.output_item.as_deref());

        let mut attrs = SkuAttributes {
            defindex: item.defindex,
            quality,
            craftable: item.craftable == Some(true),
            killstreak: item.killstreak_tier.unwrap_or(0),
            australium: item.australium.unwrap_or(false),
            festive: item.festivized.unwrap_or(false),
            effect: item.particle.as_ref().map(|p| p.id),
            paintkit: item.texture.as_ref().map(|t| t.id),
            wear: item.wear_tier.as_ref().map(|w| w.id),
            quality2: item.elevated_quality.as_ref().map(|q| q.id),
            crateseries: item.crate_series,
            target: None,
            output: output_item.map(|o| o.defindex),
            output_quality: output_item.and_then(|o| o.quality.as_ref()).map(|q| q.id),
        };

        if let Some(priceindex) = item.priceindex.as_deref().filter(|p| !p.is_empty()) {
            if attrs.defindex == UNUSUALIFIER_DEFINDEX {
                attrs.target = parse_int_prefix(priceindex);
            } else if item.recipe.is_some() {
                let parts: Vec<&str> = priceindex.split('-').collect();
                if parts.len() == 3 {
                    attrs.target = parse_int_prefix(parts[2]);
                }
            }
        }

        // The feed reports these fabricators without a killstreak tier.
        if attrs.defindex == PROFESSIONAL_FABRICATOR_DEFINDEX {
            attrs.killstreak = 3;
        } else if attrs.defindex == SPECIALIZED_FABRICATOR_DEFINDEX {
            attrs.killstreak = 2;
        }

        Some(attrs)
    }
}

/// Compute the SKU of a feed item, or `None` if it has no quality.
pub fn sku_from_item(item: &Item) -> Option<String> {
    SkuAttributes::from_item(item).map(|attrs| attrs.to_string())
}

impl fmt::Display for SkuAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.defindex, self.quality)?;

        if let Some(effect) = nonzero(self.effect) {
            write!(f, ";u{effect}")?;
        }
        if self.australium {
            f.write_str(";australium")?;
        }
        if !self.craftable {
            f.write_str(";uncraftable")?;
        }
        if let Some(wear) = nonzero(self.wear) {
            write!(f, ";w{wear}")?;
        }
        if let Some(paintkit) = nonzero(self.paintkit) {
            write!(f, ";pk{paintkit}")?;
        }
        if nonzero(self.quality2).is_some() {
            f.write_str(";strange")?;
        }
        if self.killstreak != 0 {
            write!(f, ";kt-{}", self.killstreak)?;
        }
        if let Some(target) = self.target.filter(|t| *t != 0) {
            write!(f, ";td-{target}")?;
        }
        if self.festive {
            f.write_str(";festive")?;
        }
        if let Some(crateseries) = nonzero(self.crateseries) {
            write!(f, ";c{crateseries}")?;
        }
        if let Some(output) = nonzero(self.output) {
            write!(f, ";od-{output}")?;
        }
        if let Some(output_quality) = nonzero(self.output_quality) {
            write!(f, ";oq-{output_quality}")?;
        }

        Ok(())
    }
}

fn nonzero(value: Option<i32>) -> Option<i32> {
    value.filter(|v| *v != 0)
}

/// Leading-integer parse: optional sign followed by digits, anything after the
/// digits is ignored. `None` when no digits lead the string.
fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value: i64 = rest[..digits].parse().ok()?;
    Some(if negative { -value } else { value })
}
