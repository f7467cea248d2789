// Library for tests to access modules

pub mod archive;
pub mod clock;
pub mod config;
pub mod losses;
pub mod models;
pub mod monitor;
pub mod period;
pub mod prober;
pub mod recovery;
pub mod rotation;
pub mod sender;
pub mod transport;
pub mod version;
