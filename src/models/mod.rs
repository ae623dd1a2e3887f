pub mod chart;
pub mod tier;
pub mod hold;
pub mod bundle;
pub mod wire;

pub use chart::{ContainerType, Seat, SeatRef, SeatStatus, SeatType, SeatingChart, Section, Table, TableShape};
pub use tier::{EarlyBird, Tier};
pub use hold::{HoldReceipt, SelectedSeat, SessionId};
pub use bundle::{Bundle, BundleItem, BundleQuote, BundleType};
