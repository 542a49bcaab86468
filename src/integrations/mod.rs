//! Thin wrappers around the external libraries and services the marketplace talks to.

pub mod certificate;
pub mod crawler;
pub mod mailer;
pub mod payos;
pub mod storage;
pub mod watermark;
