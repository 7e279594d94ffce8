#![allow(dead_code)]

pub mod media;
pub mod mediamon_env;
