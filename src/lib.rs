pub mod cli;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod runs;
pub mod storage;
