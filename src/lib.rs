pub mod db;
pub mod error;
pub mod referral;
pub mod routes;
