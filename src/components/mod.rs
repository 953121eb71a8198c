pub mod gallery;
pub mod gate;
pub mod history;
pub mod lightbox;
pub mod message;
