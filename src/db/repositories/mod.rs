pub mod audit;
pub mod customer;
pub mod subscription;
pub mod ticket;
pub mod user;
