pub mod github;
pub mod turnstile;
