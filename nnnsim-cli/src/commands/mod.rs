pub mod address;
pub mod classify;
pub mod policies;
pub mod run;
