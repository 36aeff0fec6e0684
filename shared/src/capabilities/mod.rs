mod checkout;
mod generator;
mod library;
mod navigation;
mod storage;

pub use self::checkout::{
    Checkout, CheckoutOperation, PaymentResponse, PaymentResult, Verification,
};
pub use self::generator::{GenerationOperation, GenerationOutput, GenerationResult, Generator};
pub use self::library::{Library, LibraryOperation, LibraryOutput, LibraryResponse};
pub use self::navigation::{Navigation, NavigationOperation};
pub use self::storage::{
    serve_storage, validate_key, LocalStorage, MemoryStorage, Storage, StorageOperation,
    StorageOutput, StorageResponse,
};

// Crux's built-in Render capability covers view updates.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub generator: Generator<Event>,
    pub checkout: Checkout<Event>,
    pub storage: Storage<Event>,
    pub library: Library<Event>,
    pub navigation: Navigation<Event>,
}
