pub mod auth;
pub mod bootstrap;
pub mod broadcast_logs;
pub mod contacts;
pub mod error;
pub mod extract;
pub mod messenger_accounts;
pub mod middleware;
pub mod password;
pub mod plans;
pub mod router;
pub mod state;
pub mod templates;
pub mod token;
pub mod users;

pub use router::router;
pub use state::{AppState, AppStateInner};
