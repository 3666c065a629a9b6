pub mod cursor;
pub mod descriptor;
pub mod instruction;
pub mod jtype;
