pub mod distribute;
pub mod schedule;
pub mod simulate;
