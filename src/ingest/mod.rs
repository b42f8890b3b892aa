/// Upstream data sources.
///
/// Each API gets its own file under `ingest/`; today that is only the
/// Environment Agency flood-monitoring API.

pub mod flood_api;

#[cfg(test)]
pub(crate) mod fixtures;
