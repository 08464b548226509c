//! Supabase REST client
//!
//! Talks to the GoTrue auth endpoints for token resolution and session
//! refresh, and to PostgREST for the `profiles`, `admin_roles` and `plants`
//! tables.

use super::{IdentityStore, StoreError};
use crate::config::IdentityStoreConfig;
use crate::core::{AdminRole, AdminRoleKind, Profile, StoreUser, TokenPair};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

const PROFILE_COLUMNS: &str = "id,email,first_name,last_name,plant_id,job_title";

/// Identity store backed by a Supabase project
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AdminRoleRow {
    role: String,
    #[serde(default)]
    plant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlantRow {
    id: String,
}

impl SupabaseStore {
    /// Create a client for the configured project
    pub fn new(config: &IdentityStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout_duration())
            .build()
            .map_err(|e| StoreError::Http(format!("failed to build HTTP client: {}", e)))?;

        let service_key = if config.service_role_key.is_empty() {
            warn!("No service role key configured - table reads use the anon key");
            config.anon_key.clone()
        } else {
            config.service_role_key.clone()
        };

        info!("Supabase identity store configured at {}", config.url);

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// PostgREST read with service credentials
    fn table_get(&self, table: &str) -> RequestBuilder {
        self.client
            .get(self.table_url(table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| {
            error!("Identity store transport error: {}", e);
            StoreError::Http(e.to_string())
        })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized),
            // GoTrue answers an unknown/used refresh token with 400
            StatusCode::BAD_REQUEST => Err(StoreError::Unauthorized),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(response.url().path().to_string())),
            status => Err(StoreError::Http(format!(
                "{} returned {}",
                response.url().path(),
                status
            ))),
        }
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IdentityStore for SupabaseStore {
    async fn get_user(&self, access_token: &str) -> Result<StoreUser, StoreError> {
        let request = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let user: StoreUser = Self::json(Self::send(request).await?).await?;
        debug!("Resolved access token to user {}", user.id);
        Ok(user)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair, StoreError> {
        let request = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }));

        let session: SessionResponse = Self::json(Self::send(request).await?).await?;

        Ok(TokenPair {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session
                .expires_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        })
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let request = self.table_get("profiles").query(&[
            ("select", PROFILE_COLUMNS.to_string()),
            ("id", format!("eq.{}", user_id)),
            ("limit", "1".to_string()),
        ]);

        let rows: Vec<Profile> = Self::json(Self::send(request).await?).await?;
        Ok(rows.into_iter().next())
    }

    async fn get_admin_roles(&self, user_id: &str) -> Result<Vec<AdminRole>, StoreError> {
        let request = self.table_get("admin_roles").query(&[
            ("select", "role,plant_id".to_string()),
            ("user_id", format!("eq.{}", user_id)),
        ]);

        let rows: Vec<AdminRoleRow> = Self::json(Self::send(request).await?).await?;

        let grants = rows
            .into_iter()
            .filter_map(|row| match row.role.parse::<AdminRoleKind>() {
                Ok(role) => Some(AdminRole {
                    role,
                    plant_id: row.plant_id,
                }),
                Err(e) => {
                    warn!("Ignoring grant for user {}: {}", user_id, e);
                    None
                }
            })
            .collect();

        Ok(grants)
    }

    async fn list_active_plants(&self) -> Result<Vec<String>, StoreError> {
        let request = self.table_get("plants").query(&[
            ("select", "id"),
            ("is_active", "eq.true"),
            ("order", "id.asc"),
        ]);

        let rows: Vec<PlantRow> = Self::json(Self::send(request).await?).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}
