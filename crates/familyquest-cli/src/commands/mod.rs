pub mod habit;
pub mod member;
pub mod quest;
pub mod stats;
