use crate::config::AuthConfig;
use axum::extract::{FromRequestParts, Query, RawPathParams};
use axum::http::{HeaderMap, Uri, request::Parts};
use std::collections::HashMap;

/// Finds the plant a request targets
///
/// Checked in order: a matched path parameter, the plant header, then the
/// query string. The path parameter and query parameter share one name.
#[derive(Debug, Clone)]
pub struct PlantSelector {
    header: String,
    param: String,
}

impl PlantSelector {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            header: config.plant_header.to_ascii_lowercase(),
            param: config.plant_query_param.clone(),
        }
    }

    pub async fn resolve(&self, parts: &mut Parts) -> Option<String> {
        if let Ok(params) = RawPathParams::from_request_parts(parts, &()).await {
            if let Some((_, value)) = params.iter().find(|(k, _)| *k == self.param) {
                return Some(value.to_string());
            }
        }

        self.from_headers(&parts.headers, &parts.uri)
    }

    /// Header or query string only
    pub fn from_headers(&self, headers: &HeaderMap, uri: &Uri) -> Option<String> {
        if let Some(value) = headers.get(self.header.as_str()) {
            if let Ok(plant) = value.to_str() {
                let plant = plant.trim();
                if !plant.is_empty() {
                    return Some(plant.to_string());
                }
            }
        }

        let Query(mut query) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
        query.remove(&self.param).filter(|plant| !plant.is_empty())
    }
}
