pub mod catalog;
pub mod credentials;
pub mod db;
pub mod models;
