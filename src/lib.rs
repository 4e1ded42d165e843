//! Clubroom - Membership & Entitlement Backend
//!
//! This crate implements checkout session creation and webhook-driven
//! entitlement reconciliation for the Clubroom membership platform.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
