use async_trait::async_trait;
use reqwest::{header::LOCATION, Client, Response};
use serde::de::DeserializeOwned;
use slog::{debug, Logger};

use crate::{
    Entity, EntityKind, EntityPage, Error, Location, ObservedProperty, Query, SensorThingsStore,
    Thing,
};

/// SensorThings store over HTTP (FROST-Server or any STA v1.0 endpoint)
pub struct FrostClient {
    logger: Logger,
    client: Client,
    base_url: String,
}

/// ID from a `Location: …/Things(42)` response header
pub fn parse_entity_id(location: &str) -> Option<i64> {
    let start = location.rfind('(')? + 1;
    let end = location[start..].find(')')? + start;
    location[start..end].trim_matches('\'').parse().ok()
}

fn store_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::StoreOperation(format!("{}: {}", context, err))
}

impl FrostClient {
    pub fn new(logger: Logger, base_url: String, user_agent: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| store_error("error building http client", e))?;
        Ok(Self {
            logger,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.base_url, kind.collection())
    }

    async fn check(&self, context: &str, response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::StoreOperation(format!("{} returned {}: {}", context, status, body)))
    }

    async fn page<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        query: &Query,
    ) -> Result<EntityPage<T>, Error> {
        let url = self.collection_url(kind);
        debug!(self.logger, "querying {} {:?}", url, query.to_params());
        let response = self
            .client
            .get(&url)
            .query(&query.to_params())
            .send()
            .await
            .map_err(|e| store_error(&format!("GET {}", url), e))?;
        self.check(&format!("GET {}", url), response)
            .await?
            .json::<EntityPage<T>>()
            .await
            .map_err(|e| store_error(&format!("error parsing {} page", kind.collection()), e))
    }

    fn body(entity: &Entity) -> Result<serde_json::Value, Error> {
        entity
            .to_json()
            .map_err(|e| store_error(&format!("error serializing {}", entity), e))
    }
}

#[async_trait]
impl SensorThingsStore for FrostClient {
    async fn things(&self, query: &Query) -> Result<EntityPage<Thing>, Error> {
        self.page(EntityKind::Thing, query).await
    }

    async fn locations(&self, query: &Query) -> Result<EntityPage<Location>, Error> {
        self.page(EntityKind::Location, query).await
    }

    async fn observed_properties(
        &self,
        query: &Query,
    ) -> Result<EntityPage<ObservedProperty>, Error> {
        self.page(EntityKind::ObservedProperty, query).await
    }

    async fn create(&self, entity: &Entity) -> Result<i64, Error> {
        let url = self.collection_url(entity.kind());
        let context = format!("POST {}", url);
        debug!(self.logger, "creating {}", entity);
        let response = self
            .client
            .post(&url)
            .json(&Self::body(entity)?)
            .send()
            .await
            .map_err(|e| store_error(&context, e))?;
        let response = self.check(&context, response).await?;
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_entity_id)
            .or(entity.id())
            .ok_or_else(|| Error::StoreOperation(format!("{} returned no entity id", context)))
    }

    async fn update(&self, entity: &Entity) -> Result<(), Error> {
        let id = entity
            .id()
            .ok_or_else(|| Error::StoreOperation(format!("cannot update {} without id", entity)))?;
        let url = format!("{}({})", self.collection_url(entity.kind()), id);
        let context = format!("PATCH {}", url);
        debug!(self.logger, "updating {}", entity);
        let response = self
            .client
            .patch(&url)
            .json(&Self::body(entity)?)
            .send()
            .await
            .map_err(|e| store_error(&context, e))?;
        self.check(&context, response).await?;
        Ok(())
    }
}
