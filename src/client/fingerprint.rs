//! List request parameters and their cache fingerprint

use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix shared by every list fingerprint
pub const FINGERPRINT_PREFIX: &str = "pokemon-list-";

/// Parameters of one `GET /pokemons` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    search: Option<String>,
}

impl ListRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            search: None,
        }
    }

    /// Set the search term; it is trimmed and dropped when empty
    pub fn with_search(mut self, search: impl AsRef<str>) -> Self {
        let trimmed = search.as_ref().trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: Some(page),
            ..self.clone()
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn is_search(&self) -> bool {
        self.search.is_some()
    }

    /// Page number, 1 when unset
    pub fn page_or_first(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    /// Cache key: the prefix plus the JSON of the present parameters
    ///
    /// Parameters are serialized from a sorted map, so two requests with the
    /// same values always share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut params: BTreeMap<&str, Value> = BTreeMap::new();
        if let Some(page) = self.page {
            params.insert("page", Value::from(page));
        }
        if let Some(limit) = self.limit {
            params.insert("limit", Value::from(limit));
        }
        if let Some(search) = &self.search {
            params.insert("search", Value::from(search.as_str()));
        }

        // A map of strings and integers always serializes
        let json = serde_json::to_string(&params).unwrap_or_default();
        format!("{}{}", FINGERPRINT_PREFIX, json)
    }

    /// Query string pairs for the HTTP request
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}
