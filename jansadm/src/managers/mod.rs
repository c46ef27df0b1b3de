pub mod backup;
pub mod bundle;
pub mod fetcher;
pub mod installation;
pub mod overlay;
pub mod registry;
pub mod systemd;
