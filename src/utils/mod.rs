pub mod cc;
pub mod hex;
pub mod quoted;
