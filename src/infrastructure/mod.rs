pub mod cache;
pub mod cosign;
pub mod directory;
pub mod keystore;
pub mod ledger;
pub mod logging;
pub mod storage;
