//! 应用层服务

pub mod panel_service;

pub use panel_service::*;
