//! Deployment-scoped metadata: version strings, protocol range, and the
//! write-once deployment id.

use rusqlite::{params, OptionalExtension};

use crate::backend::{MetadataStore, ProtocolVersionRange};
use crate::error;
use crate::schema::{
    DEFAULT_PROTOCOL_VERSION, DEPLOYMENT_ID_KEY, PLATFORM_VERSION_KEY, PROTOCOL_VERSION_MAX_KEY,
    PROTOCOL_VERSION_MIN_KEY,
};
use crate::sqlite::SqliteJobStore;

impl MetadataStore for SqliteJobStore {
    fn get_metadata(&self, key: &str) -> error::Result<Option<String>> {
        let conn = self.lock_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM platform_metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_metadata(&self, key: &str, value: &str) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO platform_metadata (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_version(&self) -> error::Result<Option<String>> {
        self.get_metadata(PLATFORM_VERSION_KEY)
    }

    fn set_version(&self, version: &str) -> error::Result<()> {
        self.set_metadata(PLATFORM_VERSION_KEY, version)
    }

    fn get_protocol_version_min(&self) -> error::Result<Option<String>> {
        self.get_metadata(PROTOCOL_VERSION_MIN_KEY)
    }

    fn set_protocol_version_min(&self, version: &str) -> error::Result<()> {
        self.set_metadata(PROTOCOL_VERSION_MIN_KEY, version)
    }

    fn get_protocol_version_max(&self) -> error::Result<Option<String>> {
        self.get_metadata(PROTOCOL_VERSION_MAX_KEY)
    }

    fn set_protocol_version_max(&self, version: &str) -> error::Result<()> {
        self.set_metadata(PROTOCOL_VERSION_MAX_KEY, version)
    }

    fn protocol_version_range(&self) -> error::Result<Option<ProtocolVersionRange>> {
        let min = self.get_protocol_version_min()?;
        let max = self.get_protocol_version_max()?;
        match (min, max) {
            (None, None) => Ok(None),
            (min, max) => {
                if min.is_none() || max.is_none() {
                    // A half-recorded range means a write was interrupted;
                    // patch the missing bound with the default.
                    tracing::warn!(
                        min = min.as_deref().unwrap_or("<missing>"),
                        max = max.as_deref().unwrap_or("<missing>"),
                        "protocol version range is half-recorded, \
                         substituting the default for the missing bound"
                    );
                }
                Ok(Some(ProtocolVersionRange {
                    min: min.unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
                    max: max.unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
                }))
            }
        }
    }

    fn get_deployment(&self) -> error::Result<Option<String>> {
        self.get_metadata(DEPLOYMENT_ID_KEY)
    }

    fn set_deployment(&self, deployment_id: &str) -> error::Result<String> {
        let conn = self.lock_conn()?;
        // Write-once: a concurrent or earlier writer wins and later
        // callers get the recorded id back.
        let inserted = conn.execute(
            "INSERT INTO platform_metadata (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO NOTHING",
            params![DEPLOYMENT_ID_KEY, deployment_id],
        )?;
        if inserted > 0 {
            return Ok(deployment_id.to_string());
        }
        let existing: String = conn.query_row(
            "SELECT value FROM platform_metadata WHERE key = ?1",
            params![DEPLOYMENT_ID_KEY],
            |row| row.get(0),
        )?;
        if existing != deployment_id {
            tracing::warn!(
                requested = deployment_id,
                recorded = %existing,
                "deployment id already recorded, keeping the existing one"
            );
        }
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteJobStore {
        SqliteJobStore::in_memory().unwrap()
    }

    #[test]
    fn metadata_round_trips_and_overwrites() {
        let store = store();
        assert!(store.get_metadata("some_key").unwrap().is_none());

        store.set_metadata("some_key", "v1").unwrap();
        assert_eq!(store.get_metadata("some_key").unwrap().as_deref(), Some("v1"));
        store.set_metadata("some_key", "v2").unwrap();
        assert_eq!(store.get_metadata("some_key").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn version_uses_its_reserved_key() {
        let store = store();
        assert!(store.get_version().unwrap().is_none());
        store.set_version("0.44.2").unwrap();
        assert_eq!(store.get_version().unwrap().as_deref(), Some("0.44.2"));
        assert_eq!(
            store.get_metadata(PLATFORM_VERSION_KEY).unwrap().as_deref(),
            Some("0.44.2")
        );
    }

    #[test]
    fn protocol_range_requires_at_least_one_bound() {
        let store = store();
        assert!(store.protocol_version_range().unwrap().is_none());

        store.set_protocol_version_min("0.2.0").unwrap();
        store.set_protocol_version_max("0.5.0").unwrap();
        let range = store.protocol_version_range().unwrap().unwrap();
        assert_eq!(range.min, "0.2.0");
        assert_eq!(range.max, "0.5.0");
    }

    #[test]
    fn half_recorded_protocol_range_falls_back_to_default() {
        let store = store();
        store.set_protocol_version_max("0.5.0").unwrap();

        let range = store.protocol_version_range().unwrap().unwrap();
        assert_eq!(range.min, DEFAULT_PROTOCOL_VERSION);
        assert_eq!(range.max, "0.5.0");
    }

    #[test]
    fn deployment_id_is_write_once() {
        let store = store();
        assert!(store.get_deployment().unwrap().is_none());

        assert_eq!(store.set_deployment("deploy-1").unwrap(), "deploy-1");
        // A second write is ignored and reports the recorded id.
        assert_eq!(store.set_deployment("deploy-2").unwrap(), "deploy-1");
        assert_eq!(store.get_deployment().unwrap().as_deref(), Some("deploy-1"));
    }
}
