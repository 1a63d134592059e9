pub mod helpers;
pub mod inventory;
