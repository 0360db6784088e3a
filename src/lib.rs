pub mod admin_seeder;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod api {
    pub mod admin;
    pub mod errors;
    pub mod files;
    pub mod health;
    pub mod media;
    pub mod profile;
    pub mod stories;
    pub mod upload;
}
pub mod db {
    pub mod gallery_repository;
    pub mod models;
    pub mod user_repository;
}
pub mod storage {
    pub mod client;
    pub mod paths;
}

#[cfg(test)]
pub mod test_support;
