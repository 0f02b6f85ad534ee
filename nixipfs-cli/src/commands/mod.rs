pub mod publish;
pub mod status;
