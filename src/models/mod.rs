mod feed;
mod interest;
mod item;

pub use feed::{Feed, NewFeed};
pub use interest::{Interest, NewInterest};
pub use item::{FeedEntry, Item, NewItem};
