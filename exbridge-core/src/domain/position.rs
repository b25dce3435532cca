use serde::{Deserialize, Serialize};

/// Net position in one instrument.
///
/// `size` is signed (long > 0, short < 0). `price` is the average entry price
/// of the open size and is reset to zero when the position goes flat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub size: f64,
    pub price: f64,
    pub realized_pnl: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.size > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0.0
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.size * (current_price - self.price)
    }

    /// Apply one signed fill.
    ///
    /// Adding in the direction of the position averages the entry price,
    /// reducing keeps it and realizes PnL on the closed part, and crossing
    /// through zero opens the remainder at the fill price.
    pub fn update(&mut self, size: f64, price: f64) {
        let old = self.size;
        let new = old + size;

        if old == 0.0 || old.signum() == size.signum() {
            if new != 0.0 {
                self.price = (self.price * old.abs() + price * size.abs()) / new.abs();
            }
        } else {
            let closed = size.abs().min(old.abs());
            self.realized_pnl += closed * (price - self.price) * old.signum();
            if new.signum() != old.signum() && new != 0.0 {
                self.price = price;
            }
        }

        self.size = new;
        if new.abs() <= 1e-12 {
            self.size = 0.0;
            self.price = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_and_averaging_in() {
        let mut p = Position::default();
        p.update(1.0, 100.0);
        p.update(1.0, 110.0);
        assert_eq!(p.size, 2.0);
        assert_eq!(p.price, 105.0);
        assert!(p.is_long());
    }

    #[test]
    fn reducing_keeps_entry_and_realizes() {
        let mut p = Position::default();
        p.update(2.0, 100.0);
        p.update(-0.5, 120.0);
        assert_eq!(p.size, 1.5);
        assert_eq!(p.price, 100.0);
        assert_eq!(p.realized_pnl, 10.0);
    }

    #[test]
    fn closing_resets_price() {
        let mut p = Position::default();
        p.update(-1.0, 50.0);
        assert!(p.is_short());
        p.update(1.0, 40.0);
        assert!(p.is_flat());
        assert_eq!(p.price, 0.0);
        assert_eq!(p.realized_pnl, 10.0);
    }

    #[test]
    fn reversal_opens_remainder_at_fill_price() {
        let mut p = Position::default();
        p.update(1.0, 100.0);
        p.update(-3.0, 90.0);
        assert_eq!(p.size, -2.0);
        assert_eq!(p.price, 90.0);
        assert_eq!(p.realized_pnl, -10.0);
    }

    #[test]
    fn unrealized_pnl_short() {
        let mut p = Position::default();
        p.update(-2.0, 100.0);
        assert_eq!(p.unrealized_pnl(90.0), 20.0);
    }
}
