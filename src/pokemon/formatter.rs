//! Raw PokeAPI detail record -> `PokemonSummary`

use crate::core::error::{PokedexError, PokedexResult};
use crate::core::types::PokemonSummary;
use serde_json::Value;
use tracing::warn;

/// Reshape a raw detail record into the output contract
///
/// Only `name` is required. Image, types, height and weight fall back to
/// `None`, `[]`, `0` and `0` respectively.
pub fn format(raw: &Value) -> PokedexResult<PokemonSummary> {
    let name = match raw.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err(PokedexError::missing_field("name")),
    };

    let image = extract_image(raw);
    if image.is_none() {
        warn!(pokemon_name = %name, "No image available for Pokemon");
    }

    Ok(PokemonSummary {
        image,
        types: extract_types(raw),
        height: extract_integer(raw.get("height")),
        weight: extract_integer(raw.get("weight")),
        name,
    })
}

/// Official artwork first, then the default front sprite
fn extract_image(raw: &Value) -> Option<String> {
    let sprites = raw.get("sprites")?;

    let artwork = sprites
        .get("other")
        .and_then(|other| other.get("official-artwork"))
        .and_then(|artwork| artwork.get("front_default"));

    non_empty_string(artwork).or_else(|| non_empty_string(sprites.get("front_default")))
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn extract_types(raw: &Value) -> Vec<String> {
    raw.get("types")
        .and_then(Value::as_array)
        .map(|slots| {
            slots
                .iter()
                .filter_map(|slot| slot.get("type")?.get("name")?.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Integer cast: floats truncate, numeric strings parse, anything else is 0
fn extract_integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}
