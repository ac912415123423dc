pub mod activity;
pub mod api;
pub mod c32;
pub mod clarity;
pub mod config;
pub mod contract;
pub mod decode;
pub mod dispatch;
pub mod network;
pub mod provider;
pub mod queries;
pub mod reflex;
pub mod session;
pub mod storage;
pub mod tx;
pub mod wallets;

pub mod test_helpers;
