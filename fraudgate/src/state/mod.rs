pub mod store;
pub mod window;

pub use store::{DeviceObservation, PatternKind, PatternSnapshot, RiskSignalStore, StoreStats, SweepReport};
