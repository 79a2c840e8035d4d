//! Crate-level tests driving streams end to end through [`mock::MockEngine`].

pub(crate) mod mock;

mod marshal;
