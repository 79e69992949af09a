pub mod accounts;
pub mod connections;
pub mod logging;
pub mod storage;
pub mod web_client;
