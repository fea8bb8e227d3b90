pub mod payment;
pub mod trial;
pub mod watch;
