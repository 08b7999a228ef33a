pub mod create;
pub mod destroy;
pub mod list;
