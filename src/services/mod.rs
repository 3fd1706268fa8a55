pub mod poll_service;
pub mod scan_service;
