#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(unsafe_code)]

pub mod app;
pub mod display;
pub mod models;
pub mod view_models;
pub mod views;
