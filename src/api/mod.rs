pub mod accounts;
pub mod domains;
pub mod endpoints;
pub mod scans;
