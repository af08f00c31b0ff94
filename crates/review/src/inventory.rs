//! Requests, rules and the latest deficiency snapshots, persisted as one
//! versioned JSON document.

use crate::error::{ReviewError, Result};
use rules_review_protocol::{
    AccessRequest, AddressEntry, Deficiency, DeficiencyKind, EntityId, EntityKind, FirewallRule,
    NewRequest, NewRule, RequestStatus, SemanticDeficiency, INVENTORY_SCHEMA_VERSION,
};
use rules_review_vector_store::VectorIndex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedInventory {
    schema_version: u32,
    #[serde(flatten)]
    inventory: Inventory,
}

/// Entity store for one review workspace.
///
/// Ids are assigned per kind from 1 and never reused, so both entity lists
/// stay sorted by id. The deficiency lists hold the result of the most recent
/// run of each track only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    requests: Vec<AccessRequest>,
    rules: Vec<FirewallRule>,
    deficiencies: Vec<Deficiency>,
    semantic_deficiencies: Vec<SemanticDeficiency>,
    last_request_id: EntityId,
    last_rule_id: EntityId,
    last_address_id: EntityId,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let persisted: PersistedInventory = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != INVENTORY_SCHEMA_VERSION {
            return Err(ReviewError::UnsupportedSchema {
                found: persisted.schema_version,
                expected: INVENTORY_SCHEMA_VERSION,
            });
        }
        Ok(persisted.inventory)
    }

    /// Loads `path`, or starts empty when the file does not exist yet.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            log::debug!("no inventory at {}, starting empty", path.display());
            Ok(Self::default())
        }
    }

    /// Writes the whole inventory through a temp file and a rename, so readers
    /// see either the previous document or this one.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let persisted = PersistedInventory {
            schema_version: INVENTORY_SCHEMA_VERSION,
            inventory: self.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    // Requests

    /// Records a submitted request with status `pending`.
    pub fn add_request(&mut self, new: NewRequest) -> Result<&AccessRequest> {
        require_name(&new.name)?;
        self.last_request_id += 1;
        self.requests.push(AccessRequest {
            id: self.last_request_id,
            name: new.name,
            status: RequestStatus::Pending,
            spec: new.spec,
            embedding_text: None,
            embedding: None,
        });
        Ok(&self.requests[self.requests.len() - 1])
    }

    #[must_use]
    pub fn requests(&self) -> &[AccessRequest] {
        &self.requests
    }

    pub fn requests_with_status(
        &self,
        status: Option<RequestStatus>,
    ) -> impl Iterator<Item = &AccessRequest> {
        self.requests
            .iter()
            .filter(move |r| status.map_or(true, |s| r.status == s))
    }

    pub fn request(&self, id: EntityId) -> Result<&AccessRequest> {
        position(&self.requests, id, |r| r.id)
            .map(|i| &self.requests[i])
            .ok_or(ReviewError::not_found(EntityKind::Request, id))
    }

    pub fn set_request_status(
        &mut self,
        id: EntityId,
        status: RequestStatus,
    ) -> Result<&AccessRequest> {
        let request = self.request_mut(id)?;
        request.status = status;
        Ok(request)
    }

    pub fn set_request_embedding(
        &mut self,
        id: EntityId,
        text: String,
        vector: Vec<f32>,
    ) -> Result<()> {
        let request = self.request_mut(id)?;
        request.embedding_text = Some(text);
        request.embedding = Some(vector);
        Ok(())
    }

    fn request_mut(&mut self, id: EntityId) -> Result<&mut AccessRequest> {
        let i = position(&self.requests, id, |r| r.id)
            .ok_or(ReviewError::not_found(EntityKind::Request, id))?;
        Ok(&mut self.requests[i])
    }

    // Rules

    /// Records an implemented rule; each source and destination becomes an
    /// address entry owned by the rule.
    pub fn add_rule(&mut self, new: NewRule) -> Result<&FirewallRule> {
        require_name(&new.name)?;
        self.last_rule_id += 1;
        let sources = self.address_entries(new.sources);
        let destinations = self.address_entries(new.destinations);
        self.rules.push(FirewallRule {
            id: self.last_rule_id,
            name: new.name,
            device: new.device,
            action: new.action,
            ports: new.ports,
            sources,
            destinations,
            embedding_text: None,
            embedding: None,
        });
        Ok(&self.rules[self.rules.len() - 1])
    }

    fn address_entries(&mut self, addresses: Vec<String>) -> Vec<AddressEntry> {
        addresses
            .into_iter()
            .map(|address| {
                self.last_address_id += 1;
                AddressEntry {
                    id: self.last_address_id,
                    address,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    pub fn rule(&self, id: EntityId) -> Result<&FirewallRule> {
        position(&self.rules, id, |r| r.id)
            .map(|i| &self.rules[i])
            .ok_or(ReviewError::not_found(EntityKind::Rule, id))
    }

    /// Removes a rule together with its address entries. Deficiencies that
    /// pointed at it stay in the snapshot with the reference cleared.
    pub fn delete_rule(&mut self, id: EntityId) -> Result<FirewallRule> {
        let i = position(&self.rules, id, |r| r.id)
            .ok_or(ReviewError::not_found(EntityKind::Rule, id))?;
        let rule = self.rules.remove(i);

        for deficiency in &mut self.deficiencies {
            if deficiency.rule_id == Some(id) {
                deficiency.rule_id = None;
            }
        }
        for deficiency in &mut self.semantic_deficiencies {
            if deficiency.rule_id == Some(id) {
                deficiency.rule_id = None;
            }
            if deficiency.best_match_rule_id == Some(id) {
                deficiency.best_match_rule_id = None;
            }
        }
        log::debug!(
            "deleted rule {id} with {} address entries",
            rule.sources.len() + rule.destinations.len()
        );
        Ok(rule)
    }

    pub fn set_rule_embedding(
        &mut self,
        id: EntityId,
        text: String,
        vector: Vec<f32>,
    ) -> Result<()> {
        let i = position(&self.rules, id, |r| r.id)
            .ok_or(ReviewError::not_found(EntityKind::Rule, id))?;
        let rule = &mut self.rules[i];
        rule.embedding_text = Some(text);
        rule.embedding = Some(vector);
        Ok(())
    }

    // Deficiency snapshots

    pub fn replace_deficiencies(&mut self, deficiencies: Vec<Deficiency>) {
        self.deficiencies = deficiencies;
    }

    pub fn replace_semantic_deficiencies(&mut self, deficiencies: Vec<SemanticDeficiency>) {
        self.semantic_deficiencies = deficiencies;
    }

    pub fn deficiencies(&self, kind: Option<DeficiencyKind>) -> impl Iterator<Item = &Deficiency> {
        self.deficiencies
            .iter()
            .filter(move |d| kind.map_or(true, |k| d.kind == k))
    }

    pub fn deficiency(&self, id: u64) -> Result<&Deficiency> {
        self.deficiencies
            .iter()
            .find(|d| d.id == id)
            .ok_or(ReviewError::DeficiencyNotFound { track: "exact", id })
    }

    /// Semantic deficiencies, newest (highest id) first.
    pub fn semantic_deficiencies(
        &self,
        kind: Option<DeficiencyKind>,
    ) -> impl Iterator<Item = &SemanticDeficiency> {
        self.semantic_deficiencies
            .iter()
            .rev()
            .filter(move |d| kind.map_or(true, |k| d.kind == k))
    }

    pub fn semantic_deficiency(&self, id: u64) -> Result<&SemanticDeficiency> {
        self.semantic_deficiencies
            .iter()
            .find(|d| d.id == id)
            .ok_or(ReviewError::DeficiencyNotFound {
                track: "semantic",
                id,
            })
    }

    // Similarity indexes

    /// Index over rule embeddings; rules without one are left out.
    pub fn rule_index(&self, dimension: usize) -> Result<VectorIndex> {
        Ok(VectorIndex::build(
            dimension,
            self.rules.iter().map(|r| (r.id, r.embedding.as_deref())),
        )?)
    }

    /// Index over request embeddings; requests without one are left out.
    pub fn request_index(&self, dimension: usize) -> Result<VectorIndex> {
        Ok(VectorIndex::build(
            dimension,
            self.requests.iter().map(|r| (r.id, r.embedding.as_deref())),
        )?)
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ReviewError::InvalidInput("name must not be empty".to_string()));
    }
    Ok(())
}

/// Ids are not assumed sorted; inventory files may be edited by hand.
fn position<T>(items: &[T], id: EntityId, key: impl Fn(&T) -> EntityId) -> Option<usize> {
    items.iter().position(|item| key(item) == id)
}
