pub mod accounts;
pub mod allocator;
pub mod config;
pub mod error;
pub mod failure;
pub mod hashing;
pub mod ledger;
pub mod model;
pub mod reference;
pub mod timetable;
pub mod types;
