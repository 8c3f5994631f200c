pub mod account;
pub mod alert;
pub mod domain;
pub mod endpoint;
pub mod scan;
pub mod subdomain;
