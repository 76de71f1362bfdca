//! Payment provider adapters.
//!
//! One adapter per provider, each implementing `ports::PaymentAdapter`:
//! inbound verification into normalized events, outbound rendering of
//! reconciliation outcomes into the provider's response vocabulary.

mod click;
mod payme;
mod stars;

pub use click::ClickAdapter;
pub use payme::PaymeAdapter;
pub use stars::StarsAdapter;
