// Lookup seam for the monitorable units
use crate::domain::unit::UnitId;
use async_trait::async_trait;

#[async_trait]
pub trait UnitDirectory: Send + Sync {
    /// All unit ids the backend knows about. An empty list is a valid answer.
    async fn list_units(&self) -> anyhow::Result<Vec<UnitId>>;
}
