pub mod library;
pub mod metadata;
pub mod scanner;
