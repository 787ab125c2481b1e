//! Documentation that spans the whole project.

pub mod overview;
pub mod testing;
