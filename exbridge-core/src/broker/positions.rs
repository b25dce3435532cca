use crate::domain::Position;
use std::collections::HashMap;

/// Net positions keyed by instrument.
#[derive(Debug, Clone, Default)]
pub struct PositionStore {
    positions: HashMap<String, Position>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the position; flat if the instrument was never traded.
    pub fn get(&self, instrument: &str) -> Position {
        self.positions.get(instrument).cloned().unwrap_or_default()
    }

    /// Apply one signed fill to the instrument's position.
    pub fn update(&mut self, instrument: &str, size: f64, price: f64) -> &Position {
        let pos = self.positions.entry(instrument.to_string()).or_default();
        pos.update(size, price);
        pos
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_instrument_is_flat() {
        let store = PositionStore::new();
        assert!(store.get("ETH/USDT").is_flat());
    }

    #[test]
    fn get_returns_a_copy() {
        let mut store = PositionStore::new();
        store.update("ETH/USDT", 1.0, 2000.0);
        let mut copy = store.get("ETH/USDT");
        copy.size = 99.0;
        assert_eq!(store.get("ETH/USDT").size, 1.0);
    }
}
