pub mod health;
pub mod nexmo;
pub mod response;
pub mod whatsapp;
