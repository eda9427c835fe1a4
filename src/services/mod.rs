pub mod proxy;
pub mod storage;
pub mod worker;
