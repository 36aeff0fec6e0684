#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod account;
pub mod app;
pub mod boot_url;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod media_store;
pub mod model;
pub mod pricing;
pub mod request;
pub mod view;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::AppConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{AppError, ErrorKind};
pub use event::Event;
pub use model::{AppState, Model};
pub use view::ViewModel;
