//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod policy;

pub use policy::{
    GlobalSpec, GlobalSpecInput, GroupSpec, GroupSpecInput, LinkSpec, LinkSpecInput, RenewPeriod,
    RepoSpec, RepoSpecInput, TokenSpec,
};
