pub mod config;
pub mod db;
pub mod drive;
pub mod error;
pub mod extract;
pub mod repositories;
pub mod router;
pub mod state;
pub mod validation;

pub mod crypto {
    pub mod aes;
    pub mod token;
}

pub mod models {
    pub mod credential;
    pub mod qr;
    pub mod session;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod credentials;
    pub mod qr_login;
    pub mod upstream;
}

pub mod handlers {
    pub mod auth;
    pub mod credentials;
    pub mod drive;
    pub mod health;
    pub mod qr;
}

pub mod middleware_layer {
    pub mod auth;
}
