pub mod account_handlers;
