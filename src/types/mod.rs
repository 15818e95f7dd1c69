pub mod currency;
pub mod errors;
pub mod rates;
pub mod timing;

pub use currency::*;
pub use errors::*;
pub use rates::*;
pub use timing::*;
