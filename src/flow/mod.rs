pub mod engine;
pub mod extractor;
pub mod ledger;
pub mod selectors;

pub use engine::{check_vehicle_displacement, entry_mode, screen_plan, EntryMode, FlowEngine, Screen};
pub use ledger::FieldLedger;
