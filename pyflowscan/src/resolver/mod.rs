//! Import maps, call-site extraction and the call-target resolution
//! cascade.

pub mod callsites;
pub mod imports;
pub mod resolve;

pub use callsites::{extract_call_sites, RawCallSite};
pub use imports::{ImportMap, ImportMapCache};
pub use resolve::{CallResolver, CallerContext, Resolution};
