pub mod filter;
pub mod hash;
pub mod json;
pub mod naming;

#[cfg(test)]
pub mod testutil;
