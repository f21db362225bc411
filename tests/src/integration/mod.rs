//! Cross-crate integration and property tests.

#[cfg(test)]
pub(crate) mod harness;

#[cfg(test)]
mod properties;

#[cfg(test)]
mod scenarios;
