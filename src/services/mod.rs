pub mod auth;
pub mod hasher;
pub mod naming;
pub mod publisher;
pub mod sink;
pub mod upload_service;
