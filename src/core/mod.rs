pub mod engine;
pub mod enumerator;
pub mod events;
pub mod machine;
pub mod model;
pub mod pattern;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
