//! Name lookup for the trader arena.
//!
//! The simulation addresses traders only by [`TraderId`]; names exist for
//! reports and exports.

use std::collections::HashMap;

use crate::domain::TraderId;

#[derive(Debug, Clone, Default)]
pub struct TraderDirectory {
    names: Vec<String>,
    ids: HashMap<String, TraderId>,
}

impl TraderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next trader. Ids are handed out in registration order,
    /// matching the arena index.
    pub fn register(&mut self, name: impl Into<String>) -> TraderId {
        let name = name.into();
        let id = TraderId(self.names.len() as u32);
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    pub fn id(&self, name: &str) -> Option<TraderId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: TraderId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TraderId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (TraderId(i as u32), n.as_str()))
    }
}
