// src/repositories/postgres/mod.rs

pub mod activations;
pub mod channel_state;
pub mod memes;
pub mod users;
pub mod wallets;

pub use activations::PostgresActivationRepository;
pub use channel_state::PostgresChannelStateRepository;
pub use memes::PostgresMemeRepository;
pub use users::PostgresUserRepository;
pub use wallets::PostgresWalletLedger;
