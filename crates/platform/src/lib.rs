mod registrar;

pub use registrar::*;
