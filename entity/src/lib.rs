//! Persistence models for the CRM collections.
//!
//! Each module maps one document collection onto a table. Status, stage and
//! type columns are free-form strings; they are never validated on write.

pub mod activity;
pub mod app_user;
pub mod customer;
pub mod deal;
pub mod lead;
pub mod membership;
pub mod organization;
pub mod subscription;
pub mod usage_counter;
