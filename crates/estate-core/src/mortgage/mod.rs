pub mod amortization;
pub mod payment_schedule;
