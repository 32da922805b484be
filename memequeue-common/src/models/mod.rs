// File: memequeue-common/src/models/mod.rs
pub mod activation;
pub mod channel_state;
pub mod meme;
pub mod queue;
pub mod user;
pub mod wallet;

pub use activation::{Activation, ActivationStatus, EndReason};
pub use channel_state::ChannelPlaybackState;
pub use meme::ChannelMeme;
pub use queue::{
    ActorRole, ClearOutcome, EnqueueOutcome, FinishOutcome, Initiator, PlaybackPayload,
    ResumeOutcome, ToggleOutcome,
};
pub use user::User;
pub use wallet::Wallet;
