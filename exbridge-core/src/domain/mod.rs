//! Domain types: bars, tracked orders, fills, positions.

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;

pub use bar::{Bar, OhlcvRow};
pub use fill::{Fill, FillSource};
pub use ids::{FillId, OrderId};
pub use order::{ExecType, OrderSide, OrderStatus, TrackedOrder};
pub use position::Position;
