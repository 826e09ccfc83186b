//! `StacCatalog`: the narrow client interface to an external STAC
//! database (out of scope to implement the catalog itself, per the
//! pipeline's purpose/scope). Implements the "last write wins after
//! checksum match, fail on mismatch" registration conflict rule.

use cfw_core::model::StacItem;
use cfw_core::{CfwError, CfwResult};

use crate::retry::with_backoff;

/// Registers and looks up STAC items for Prediction Rasters and
/// Composite Rasters. The catalog itself lives outside this workspace.
pub trait StacCatalog: Send + Sync {
    fn get_item(&self, item_id: &str) -> CfwResult<Option<StacItem>>;
    fn put_item(&self, item: &StacItem) -> CfwResult<()>;
}

/// Registers `item`, enforcing I4: if an item with the same id already
/// exists, its recorded checksum must match `item`'s, otherwise this is
/// a fatal integrity error (never silently overwritten). A matching
/// checksum re-registers the item (last write wins on everything but
/// the checksum itself, e.g. an updated STAC `properties` map).
pub fn register_with_conflict_check(catalog: &dyn StacCatalog, item: &StacItem) -> CfwResult<()> {
    if let Some(existing) = catalog.get_item(&item.id)? {
        cfw_core::invariants::check_checksum_matches(
            &existing.asset_checksum_sha256,
            &item.asset_checksum_sha256,
        )?;
    }
    catalog.put_item(item)
}

/// HTTP/JSON client against a STAC API (`GET /collections/{c}/items/{id}`,
/// `PUT /collections/{c}/items/{id}`), built on the same blocking `ureq`
/// transport as the rest of this crate.
pub struct HttpStacCatalog {
    base_url: String,
    agent: ureq::Agent,
    connection_string: Option<String>,
}

impl HttpStacCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::AgentBuilder::new().build(),
            connection_string: None,
        }
    }

    /// Attaches the `CFW_STAC_CONNECTION_STRING` env var as a bearer
    /// token sent on every request to the catalog's HTTP front-end.
    pub fn with_connection_string(mut self, connection_string: Option<String>) -> Self {
        self.connection_string = connection_string;
        self
    }

    fn item_url(&self, collection: &str, item_id: &str) -> String {
        format!(
            "{}/collections/{}/items/{}",
            self.base_url.trim_end_matches('/'),
            collection,
            item_id
        )
    }

    fn authed(&self, request: ureq::Request) -> ureq::Request {
        match &self.connection_string {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }
}

impl StacCatalog for HttpStacCatalog {
    fn get_item(&self, item_id: &str) -> CfwResult<Option<StacItem>> {
        // The collection is not known until the item itself is
        // fetched by id; the real STAC API exposes a cross-collection
        // search endpoint for this, used here instead of the
        // collection-scoped path.
        let url = format!("{}/search?ids={item_id}", self.base_url.trim_end_matches('/'));
        with_backoff(&format!("stac_get:{item_id}"), || {
            let response = match self.authed(self.agent.get(&url)).call() {
                Ok(r) => r,
                Err(ureq::Error::Status(404, _)) => return Ok(None),
                Err(err) => return Err(CfwError::Transport(format!("STAC search failed: {err}"))),
            };
            let items: Vec<StacItem> = response
                .into_json()
                .map_err(|e| CfwError::Transport(format!("STAC search returned invalid JSON: {e}")))?;
            Ok(items.into_iter().next())
        })
    }

    fn put_item(&self, item: &StacItem) -> CfwResult<()> {
        let url = self.item_url(&item.collection, &item.id);
        with_backoff(&format!("stac_put:{}", item.id), || {
            self.authed(self.agent.put(&url))
                .send_json(serde_json::to_value(item)?)
                .map_err(|e| CfwError::Transport(format!("STAC item registration failed: {e}")))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfw_core::model::StacTemporalExtent;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeCatalog(RefCell<HashMap<String, StacItem>>);

    impl StacCatalog for FakeCatalog {
        fn get_item(&self, item_id: &str) -> CfwResult<Option<StacItem>> {
            Ok(self.0.borrow().get(item_id).cloned())
        }
        fn put_item(&self, item: &StacItem) -> CfwResult<()> {
            self.0.borrow_mut().insert(item.id.clone(), item.clone());
            Ok(())
        }
    }

    fn item(checksum: &str) -> StacItem {
        StacItem {
            id: "cfw-r1-2024-03".into(),
            collection: "predictions".into(),
            asset_url: "https://store/cfw-r1-2024-03.tif".into(),
            asset_checksum_sha256: checksum.into(),
            bbox: (0.0, 0.0, 1.0, 1.0),
            temporal_extent: StacTemporalExtent::Month { year: 2024, month: 3 },
        }
    }

    #[test]
    fn matching_checksum_reregisters() {
        let catalog = FakeCatalog(RefCell::new(HashMap::new()));
        register_with_conflict_check(&catalog, &item("abc")).unwrap();
        register_with_conflict_check(&catalog, &item("abc")).unwrap();
    }

    #[test]
    fn mismatched_checksum_is_fatal() {
        let catalog = FakeCatalog(RefCell::new(HashMap::new()));
        register_with_conflict_check(&catalog, &item("abc")).unwrap();
        let result = register_with_conflict_check(&catalog, &item("def"));
        assert!(matches!(result, Err(CfwError::Integrity(_))));
    }
}
