use async_trait::async_trait;

use crate::{
    Entity, EntityPage, Error, Expand, Filter, Location, ObservedProperty, OrderBy, Query, Thing,
};

/// CRUD + query surface of a SensorThings API server
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorThingsStore: Send + Sync {
    async fn things(&self, query: &Query) -> Result<EntityPage<Thing>, Error>;
    async fn locations(&self, query: &Query) -> Result<EntityPage<Location>, Error>;
    async fn observed_properties(&self, query: &Query)
        -> Result<EntityPage<ObservedProperty>, Error>;
    /// Returns the ID the store holds the new entity under.
    async fn create(&self, entity: &Entity) -> Result<i64, Error>;
    async fn update(&self, entity: &Entity) -> Result<(), Error>;
}

fn by_name(name: &str) -> Query {
    Query::new()
        .filter(Filter::NameEq(name.to_string()))
        .top(1)
}

/// The Thing comes back with its Datastreams and their Sensor IDs.
pub async fn find_thing(
    store: &dyn SensorThingsStore,
    name: &str,
) -> Result<Option<Thing>, Error> {
    let query = by_name(name).expand(Expand::Datastreams);
    Ok(store.things(&query).await?.items.into_iter().next())
}

pub async fn find_location(
    store: &dyn SensorThingsStore,
    name: &str,
) -> Result<Option<Location>, Error> {
    Ok(store.locations(&by_name(name)).await?.items.into_iter().next())
}

pub async fn find_observed_property(
    store: &dyn SensorThingsStore,
    name: &str,
) -> Result<Option<ObservedProperty>, Error> {
    Ok(store
        .observed_properties(&by_name(name))
        .await?
        .items
        .into_iter()
        .next())
}

/// Number of Things carrying `description`
pub async fn count_things(store: &dyn SensorThingsStore, description: &str) -> Result<u64, Error> {
    let query = Query::new()
        .filter(Filter::DescriptionEq(description.to_string()))
        .top(0)
        .with_count();
    let page = store.things(&query).await?;
    page.count.ok_or_else(|| {
        Error::StoreOperation(String::from("store did not return @iot.count for Things"))
    })
}

/// Highest Thing ID in the store, `None` when it holds no Things
pub async fn max_thing_id(store: &dyn SensorThingsStore) -> Result<Option<i64>, Error> {
    let query = Query::new().order_by(OrderBy::IdDesc).top(1);
    Ok(store
        .things(&query)
        .await?
        .items
        .first()
        .and_then(|thing| thing.id))
}
