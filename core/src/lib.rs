pub mod aggregate;
pub mod backfill;
pub mod csv_io;
pub mod db;
pub mod error;
pub mod lookup;
pub mod models;
pub mod openfoodfacts;
pub mod persistence;
pub mod service;
pub mod store;

pub use error::{Error, Result};
