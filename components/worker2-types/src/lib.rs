#![deny(warnings)]

pub mod events;
pub mod jobs;
