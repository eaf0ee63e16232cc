pub mod flag_aggregator;
pub mod flag_kind;
pub mod flag_state;
