pub mod app;
pub mod config;
pub mod error;
pub mod state;

pub mod crypto {
    pub mod signing;
}

pub mod models {
    pub mod session;
}

pub mod services {
    pub mod desk;
    pub mod oauth;
    pub mod session;
}

pub mod handlers {
    pub mod session;
    pub mod tickets;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod tickets;
}

pub use app::router;
pub use config::Config;
pub use state::AppState;
