use serde::{Deserialize, Serialize};

/// Item description as delivered by the marketplace feed.
///
/// Only the attributes that take part in SKU canonicalization are typed here;
/// the full payload is kept verbatim as JSON on the stored listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    pub appid: Option<u32>,
    /// Asset id of the concrete item (absent for buy orders).
    #[serde(deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub defindex: i32,
    pub quality: Option<Quality>,
    pub craftable: Option<bool>,
    pub killstreak_tier: Option<i32>,
    pub australium: Option<bool>,
    pub festivized: Option<bool>,
    pub particle: Option<Particle>,
    pub texture: Option<Texture>,
    pub wear_tier: Option<WearTier>,
    pub elevated_quality: Option<Quality>,
    pub crate_series: Option<i32>,
    pub recipe: Option<Recipe>,
    /// Composite price index.
    ///
    /// Two unrelated encodings share this field, e.g. `6526-6-206` for a
    /// fabricator kit (kit defindex, quality, target defindex) and `702` for
    /// an Unusualifier (target defindex).
    pub priceindex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quality {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WearTier {
    pub id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    pub output_item: Option<Box<Item>>,
}

impl Item {
    /// Parse the typed view out of a raw item payload.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Item::deserialize(value)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
