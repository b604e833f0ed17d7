pub mod candidate;
pub mod interview;
pub mod requisition;
pub mod user;
