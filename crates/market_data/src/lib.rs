pub mod remote;
pub mod traits;

pub use remote::ExchangeClient;
pub use traits::MarketDataSource;
