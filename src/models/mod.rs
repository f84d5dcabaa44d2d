pub mod customer;
pub mod role;
pub mod subscription;
pub mod ticket;
