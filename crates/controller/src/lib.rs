//! Recommendation controller process: configuration, startup data and the
//! health/metrics HTTP surface.

pub mod api;
pub mod config;
pub mod seed;
