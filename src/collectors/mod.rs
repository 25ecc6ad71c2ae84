#[cfg(test)]
pub mod fake;
pub mod mon;
pub mod session;
