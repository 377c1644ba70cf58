pub mod log;
pub mod session;

pub use log::{CatchUp, CommandLog, Delivery};
pub use session::{FollowerHandle, Session};
