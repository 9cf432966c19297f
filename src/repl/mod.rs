pub mod console;
pub mod history;
pub mod statement;
