//! # Community Connect
//!
//! A registry of volunteers, community organisations, skills and events,
//! with transactional writes and analytical queries over one SQLite file.
//!
//! ## Core Components
//!
//! - **Connect-Store** (`db`): writer and reader connections, scoped transactions
//! - **Schema** (`schema`, `seed`): table definitions, initialisation, sample data
//! - **Model** (`model`, `validate`): rows, closed enumerations, boundary checks
//! - **Writes** (`crud`, `integrity`, `writes`): atomic mutations with capacity control
//! - **Queries** (`queries`): skill search, rosters, statistics and reports
//! - **Connect-API** (`api`): Axum router exposing everything as JSON

pub mod api;
pub mod crud;
pub mod db;
pub mod error;
pub mod integrity;
pub mod model;
pub mod queries;
pub mod schema;
pub mod seed;
pub mod validate;
pub mod writes;

pub use error::{ConnectError, ConnectResult};
