use streaming::protocol::TerritoryRecord;

use crate::polygon::PolygonPath;
use layers::symbology::DEFAULT_TERRITORY_COLOR;

/// Territory identity. `Pending` ids are local placeholders for rows the
/// service has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TerritoryId {
    Pending(u64),
    Saved(String),
}

impl TerritoryId {
    pub fn is_saved(&self) -> bool {
        matches!(self, TerritoryId::Saved(_))
    }

    pub fn saved(&self) -> Option<&str> {
        match self {
            TerritoryId::Saved(id) => Some(id),
            TerritoryId::Pending(_) => None,
        }
    }
}

impl std::fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerritoryId::Pending(n) => write!(f, "temp-{n}"),
            TerritoryId::Saved(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Territory {
    pub id: TerritoryId,
    pub name: String,
    pub color: String,
    /// Empty when the service returned no geometry.
    pub path: PolygonPath,
}

impl Territory {
    pub fn from_record(record: TerritoryRecord) -> Self {
        let path = record
            .geom
            .as_ref()
            .map(PolygonPath::from_geometry)
            .unwrap_or_default();
        Self {
            id: TerritoryId::Saved(record.id),
            name: record.name,
            color: record
                .color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TERRITORY_COLOR.to_string()),
            path,
        }
    }
}

/// Ordered in-memory list of territories, with optimistic inserts.
#[derive(Debug, Default, Clone)]
pub struct TerritoryStore {
    items: Vec<Territory>,
    next_pending: u64,
}

impl TerritoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole list with what the service returned.
    pub fn load(&mut self, records: Vec<TerritoryRecord>) {
        self.items = records.into_iter().map(Territory::from_record).collect();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Territory> + '_ {
        self.items.iter()
    }

    pub fn get(&self, id: &TerritoryId) -> Option<&Territory> {
        self.items.iter().find(|t| &t.id == id)
    }

    /// Appends a territory under a fresh placeholder id.
    pub fn insert_pending(&mut self, name: String, color: String, path: PolygonPath) -> TerritoryId {
        self.next_pending += 1;
        let id = TerritoryId::Pending(self.next_pending);
        self.items.push(Territory {
            id: id.clone(),
            name,
            color,
            path,
        });
        id
    }

    /// Replaces the placeholder in place with the persisted record.
    /// Returns the permanent id, or `None` if the placeholder is gone.
    pub fn confirm(&mut self, pending: &TerritoryId, record: TerritoryRecord) -> Option<TerritoryId> {
        let slot = self.items.iter_mut().find(|t| &t.id == pending)?;
        let mut confirmed = Territory::from_record(record);
        if confirmed.path.is_empty() {
            confirmed.path = std::mem::take(&mut slot.path);
        }
        let id = confirmed.id.clone();
        *slot = confirmed;
        Some(id)
    }

    /// Adds a persisted record, replacing any entry with the same id.
    /// `fallback` stands in for a record that came back without geometry.
    pub fn upsert(&mut self, record: TerritoryRecord, fallback: PolygonPath) -> TerritoryId {
        let mut territory = Territory::from_record(record);
        if territory.path.is_empty() {
            territory.path = fallback;
        }
        let id = territory.id.clone();
        match self.items.iter_mut().find(|t| t.id == id) {
            Some(slot) => *slot = territory,
            None => self.items.push(territory),
        }
        id
    }

    /// Drops a placeholder whose save failed.
    pub fn rollback(&mut self, pending: &TerritoryId) -> Option<Territory> {
        if pending.is_saved() {
            return None;
        }
        self.remove(pending)
    }

    pub fn remove(&mut self, id: &TerritoryId) -> Option<Territory> {
        let index = self.items.iter().position(|t| &t.id == id)?;
        Some(self.items.remove(index))
    }

    /// Case-insensitive substring match on the name; an empty query matches all.
    pub fn search(&self, query: &str) -> Vec<&Territory> {
        let needle = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|t| t.name.to_lowercase().contains(&needle))
            .collect()
    }
}
