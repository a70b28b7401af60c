pub mod api;
pub mod bidding;
pub mod chat;
pub mod clock;
pub mod countdown;
pub mod error;
pub mod notifications;
pub mod realtime;
pub mod search;
pub mod session;
pub mod settings;
