pub mod auth;
pub mod connections;
pub mod health;
pub mod onboarding;
pub mod profile;
pub mod requests;
pub mod users;
