//! # Core Types
//!
//! Data structures shared by the server pipeline and the client library: the
//! output record, pagination metadata, the list result and the HTTP envelope.

use serde::{Deserialize, Serialize};

/// One Pokémon as returned by `/api/pokemons`
///
/// `height` and `weight` stay in PokeAPI units (decimeters and hectograms).
/// Conversion is a presentation concern, see [`PokemonSummary::height_in_meters`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonSummary {
    pub name: String,
    pub image: Option<String>,
    pub types: Vec<String>,
    pub height: i64,
    pub weight: i64,
}

impl PokemonSummary {
    /// Name with the first letter upper-cased ("pikachu" -> "Pikachu")
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn height_in_meters(&self) -> f64 {
        self.height as f64 / 10.0
    }

    pub fn weight_in_kilograms(&self) -> f64 {
        self.weight as f64 / 10.0
    }
}

/// Pagination metadata
///
/// Invariants: `total_pages == ceil(total_count / limit)` and
/// `has_next == (current_page < total_pages)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_count: u64,
    pub has_next: bool,
}

impl PaginationInfo {
    /// Compute pagination for `current_page` over `total_count` items, `limit` per page
    pub fn new(current_page: u32, total_count: u64, limit: u32) -> Self {
        let limit = u64::from(limit.max(1));
        let total_pages = total_count.div_ceil(limit);

        Self {
            current_page,
            total_pages,
            total_count,
            has_next: u64::from(current_page) < total_pages,
        }
    }
}

/// A page of formatted Pokémon plus its pagination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    pub data: Vec<PokemonSummary>,
    pub pagination: PaginationInfo,
}

/// An index entry that was dropped while aggregating a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub name: String,
    pub url: String,
    pub reason: String,
}

/// Result of a list aggregation, including what was dropped and why
#[derive(Debug, Clone, PartialEq)]
pub struct ListOutcome {
    pub result: ListResult,
    pub skipped: Vec<SkippedEntry>,
}

impl ListOutcome {
    pub fn into_result(self) -> ListResult {
        self.result
    }
}

/// Success envelope for `GET /api/pokemons`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<PokemonSummary>,
    pub pagination: PaginationInfo,
}

impl ListResponse {
    pub fn from_result(result: ListResult, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: result.data,
            pagination: result.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p = PaginationInfo::new(1, 1292, 20);
        assert_eq!(p.total_pages, 65);
        assert!(p.has_next);

        let p = PaginationInfo::new(65, 1292, 20);
        assert!(!p.has_next);

        let p = PaginationInfo::new(999, 1292, 20);
        assert_eq!(p.total_pages, 65);
        assert!(!p.has_next);

        let p = PaginationInfo::new(1, 0, 20);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);

        let p = PaginationInfo::new(1, 100, 100);
        assert_eq!(p.total_pages, 1);
        assert!(!p.has_next);
    }

    #[test]
    fn test_presentation_helpers() {
        let pikachu = PokemonSummary {
            name: "pikachu".to_string(),
            image: None,
            types: vec!["electric".to_string()],
            height: 4,
            weight: 60,
        };

        assert_eq!(pikachu.display_name(), "Pikachu");
        assert!((pikachu.height_in_meters() - 0.4).abs() < f64::EPSILON);
        assert!((pikachu.weight_in_kilograms() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_image_serializes_as_null() {
        let summary = PokemonSummary {
            name: "missingno".to_string(),
            image: None,
            types: vec![],
            height: 0,
            weight: 0,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value["image"].is_null());
    }
}
