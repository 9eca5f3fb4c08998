//! Request handlers

pub mod account;
pub mod conversation;
pub mod health;
pub mod purchase;
pub mod refund;
