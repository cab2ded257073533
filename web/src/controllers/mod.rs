pub mod auth;
pub mod home;
pub mod mail;
pub mod news;
pub mod profile;
