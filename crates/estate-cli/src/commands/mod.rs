pub mod cashflow;
pub mod mortgage;
pub mod notes;
pub mod simulation;
