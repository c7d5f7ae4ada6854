//! LP Shop Domain Concerns

pub mod carts;
