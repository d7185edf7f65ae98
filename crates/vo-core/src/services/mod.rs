pub mod config_loader;
pub mod deploy;
pub mod descriptor;
pub mod git;
pub mod host;
pub mod maintenance;
pub mod net;
pub mod prober;
pub mod proxy;
pub mod registry;
pub mod runner;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;
