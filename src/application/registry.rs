// Channel registry - The session's set of live channels keyed by unit
use crate::application::channel::{Channel, ConnectionState};
use crate::domain::metrics::Row;
use crate::domain::unit::UnitId;
use std::collections::BTreeMap;

/// Sole owner of every channel. Removing a channel closes it.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<UnitId, Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel, closing whatever channel previously served the same unit.
    pub fn insert(&mut self, channel: Channel) {
        if let Some(mut previous) = self.channels.insert(channel.unit().clone(), channel) {
            previous.close();
        }
    }

    pub fn remove(&mut self, unit: &UnitId) -> Option<Channel> {
        let mut channel = self.channels.remove(unit)?;
        channel.close();
        Some(channel)
    }

    /// Close and drop every channel, returning the units that were registered.
    pub fn clear(&mut self) -> Vec<UnitId> {
        let units = self.units();
        for channel in self.channels.values_mut() {
            channel.close();
        }
        self.channels.clear();
        units
    }

    #[cfg(test)]
    pub fn get(&self, unit: &UnitId) -> Option<&Channel> {
        self.channels.get(unit)
    }

    pub fn get_mut(&mut self, unit: &UnitId) -> Option<&mut Channel> {
        self.channels.get_mut(unit)
    }

    pub fn contains(&self, unit: &UnitId) -> bool {
        self.channels.contains_key(unit)
    }

    pub fn units(&self) -> Vec<UnitId> {
        self.channels.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    /// Rows of every open channel's latest snapshot.
    pub fn healthy_rows(&self) -> impl Iterator<Item = &Row> {
        self.channels
            .values()
            .filter(|c| c.state() == ConnectionState::Open)
            .filter_map(Channel::last_snapshot)
            .flat_map(|snapshot| snapshot.rows().iter())
    }
}
