pub mod model;
pub mod view;

pub use model::{Auction, AuctionStatus, Bid, MaxBid};
pub use view::AuctionView;
