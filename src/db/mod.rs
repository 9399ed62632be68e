pub mod account;
pub mod ledger;
pub mod schema;
pub mod utils;
