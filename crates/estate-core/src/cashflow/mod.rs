pub mod financial_schedule;
pub mod income;
