pub mod currency;
pub mod mailer;
pub mod stripe;
