mod raindrop;

pub use raindrop::RaindropClient;
