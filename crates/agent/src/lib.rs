pub mod agent;
pub mod certbot;
pub mod certificate;
pub mod config;
pub mod domains;
pub mod kong;
#[cfg(test)]
mod test_support;
