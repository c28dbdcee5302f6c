pub(crate) mod active;
pub(crate) mod command;
pub(crate) mod job;
pub(crate) mod page;
pub(crate) mod pillars;
pub(crate) mod recent;
