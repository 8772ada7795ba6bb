pub mod probe;
pub mod settings;
pub mod simulate;
pub mod url;
