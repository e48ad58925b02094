mod guest;
mod payment_log;
mod reservation;
mod room;

pub use guest::*;
pub use payment_log::*;
pub use reservation::*;
pub use room::*;
