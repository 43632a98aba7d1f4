#[macro_use] extern crate rocket;
#[macro_use] extern crate serde_derive;

pub mod catalog;
pub mod common;
pub mod config;
pub mod favorites;
pub mod its_client;
pub mod link_matcher;
pub mod map;
pub mod nearest;
pub mod rest_api;
pub mod speed;
pub mod traffic;
